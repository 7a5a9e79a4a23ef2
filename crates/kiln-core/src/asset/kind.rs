// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::path::Path;

/// The closed set of loadable resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A 2D image uploaded as RGBA8 pixels.
    Texture,
    /// Indexed triangle geometry.
    Model,
    /// PCM audio kept in host memory.
    Sound,
    /// A glyph atlas plus per-glyph metrics.
    Font,
    /// Opaque bytes uploaded as-is.
    Buffer,
}

impl ResourceKind {
    /// Every kind, in a stable order.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Texture,
        ResourceKind::Model,
        ResourceKind::Sound,
        ResourceKind::Font,
        ResourceKind::Buffer,
    ];

    /// Infers the kind from a path's extension (case-insensitive).
    ///
    /// Unknown or missing extensions are treated as raw buffers.
    ///
    /// ```
    /// use kiln_core::asset::ResourceKind;
    ///
    /// assert_eq!(ResourceKind::from_path("ui/button.PNG"), ResourceKind::Texture);
    /// assert_eq!(ResourceKind::from_path("sfx/click.wav"), ResourceKind::Sound);
    /// assert_eq!(ResourceKind::from_path("data/table.bin"), ResourceKind::Buffer);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("png" | "jpg" | "jpeg" | "bmp" | "tga") => ResourceKind::Texture,
            Some("obj" | "gltf" | "glb" | "mesh") => ResourceKind::Model,
            Some("wav" | "ogg" | "flac" | "mp3") => ResourceKind::Sound,
            Some("ttf" | "otf" | "fnt") => ResourceKind::Font,
            _ => ResourceKind::Buffer,
        }
    }

    /// A lowercase name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            ResourceKind::Texture => "texture",
            ResourceKind::Model => "model",
            ResourceKind::Sound => "sound",
            ResourceKind::Font => "font",
            ResourceKind::Buffer => "buffer",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a resource handle stands in its load lifecycle.
///
/// ```text
/// Unloaded -> Loading -> Loaded
///                \-----> Failed
/// Loaded/Failed -> Unloaded (unload) -> Loading (reload)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// Nothing is loaded and no load is in flight.
    #[default]
    Unloaded,
    /// A decode or GPU upload is in flight. The fallback is served.
    Loading,
    /// The resource is usable.
    Loaded,
    /// Decoding or finalizing failed. The fallback is served.
    Failed,
}

impl LoadState {
    /// Returns `true` for [`LoadState::Loaded`].
    pub const fn is_usable(self) -> bool {
        matches!(self, LoadState::Loaded)
    }
}
