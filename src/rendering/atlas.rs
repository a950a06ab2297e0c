use thiserror::Error;

use crate::assets::DecodedTexture;

const BYTES_PER_TEXEL: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PackError {
    #[error("No room left for a {width}x{height} texture")]
    NoRoom { width: u32, height: u32 },

    #[error("Textures need a non-zero size, got {width}x{height}")]
    EmptyTexture { width: u32, height: u32 },

    #[error("Expected {expected} bytes of RGBA pixels, got {actual}")]
    PixelMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn overlaps(&self, other: &AtlasRect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Where a texture ended up. Written once when the texture's loader completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub atlas_page_id: u32,
    pub transparent: bool,
    pub rect: AtlasRect,
}

#[derive(Debug)]
struct Shelf {
    y: u32,
    height: u32,
    cursor_x: u32,
}

/// A fixed size RGBA8 image that textures are packed into, row ("shelf") by row.
#[derive(Debug)]
pub struct AtlasPage {
    id: u32,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    shelves: Vec<Shelf>,
    next_shelf_y: u32,
    texture_count: usize,
    used_area: u64,
}

impl AtlasPage {
    fn new(id: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_TEXEL],
            shelves: Vec::new(),
            next_shelf_y: 0,
            texture_count: 0,
            used_area: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn texture_count(&self) -> usize {
        self.texture_count
    }

    pub fn used_area(&self) -> u64 {
        self.used_area
    }

    pub fn capacity(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn pack_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        transparent: bool,
    ) -> Result<TextureSlot, PackError> {
        if width == 0 || height == 0 {
            return Err(PackError::EmptyTexture { width, height });
        }

        let expected = width as usize * height as usize * BYTES_PER_TEXEL;
        if pixels.len() != expected {
            return Err(PackError::PixelMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        let (x, y) = self
            .allocate(width, height)
            .ok_or(PackError::NoRoom { width, height })?;

        let rect = AtlasRect { x, y, width, height };
        self.blit(&rect, pixels);
        self.texture_count += 1;
        self.used_area += rect.area();

        Ok(TextureSlot {
            atlas_page_id: self.id,
            transparent,
            rect,
        })
    }

    /// First fit over the existing shelves, then a new shelf below the last one.
    fn allocate(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width > self.width {
            return None;
        }

        let page_width = self.width;
        if let Some(shelf) = self
            .shelves
            .iter_mut()
            .find(|shelf| height <= shelf.height && shelf.cursor_x + width <= page_width)
        {
            let position = (shelf.cursor_x, shelf.y);
            shelf.cursor_x += width;
            return Some(position);
        }

        if self.next_shelf_y + height > self.height {
            return None;
        }

        let y = self.next_shelf_y;
        self.shelves.push(Shelf {
            y,
            height,
            cursor_x: width,
        });
        self.next_shelf_y += height;
        Some((0, y))
    }

    fn blit(&mut self, rect: &AtlasRect, pixels: &[u8]) {
        let row_len = rect.width as usize * BYTES_PER_TEXEL;
        let page_row_len = self.width as usize * BYTES_PER_TEXEL;

        for (row, source) in pixels.chunks_exact(row_len).enumerate() {
            let start = (rect.y as usize + row) * page_row_len + rect.x as usize * BYTES_PER_TEXEL;
            self.pixels[start..start + row_len].copy_from_slice(source);
        }
    }
}

/// Hands out atlas pages. Pages are only ever appended, and a new one is only created after
/// the last page got at least one texture, so callers can't leave holes or empty pages.
#[derive(Debug)]
pub struct AtlasAllocator {
    page_width: u32,
    page_height: u32,
    pages: Vec<AtlasPage>,
}

impl AtlasAllocator {
    /// Pages are half the maximum texture size in each axis, trading packing density for
    /// memory spent on pages that will never fill up.
    pub fn new(max_texture_size: u32) -> Self {
        let side = (max_texture_size / 2).max(1);
        Self {
            page_width: side,
            page_height: side,
            pages: Vec::new(),
        }
    }

    pub fn page_size(&self) -> (u32, u32) {
        (self.page_width, self.page_height)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[AtlasPage] {
        &self.pages
    }

    /// Returns page `index`, creating it if it is the next page in line and the current last
    /// page has been used.
    pub fn page_for(&mut self, index: usize) -> Option<&mut AtlasPage> {
        if index < self.pages.len() {
            return self.pages.get_mut(index);
        }

        let last_used = self
            .pages
            .last()
            .is_none_or(|page| page.texture_count() > 0);

        if index == self.pages.len() && last_used {
            let id = u32::try_from(index).ok()?;
            self.pages
                .push(AtlasPage::new(id, self.page_width, self.page_height));
            return self.pages.last_mut();
        }

        None
    }

    /// Packs the texture into the first page that has room, appending a page if needed.
    pub fn pack(&mut self, texture: &DecodedTexture) -> Result<TextureSlot, PackError> {
        if texture.width > self.page_width || texture.height > self.page_height {
            return Err(PackError::NoRoom {
                width: texture.width,
                height: texture.height,
            });
        }

        let mut index = 0;
        loop {
            let Some(page) = self.page_for(index) else {
                return Err(PackError::NoRoom {
                    width: texture.width,
                    height: texture.height,
                });
            };

            match page.pack_texture(
                &texture.pixels,
                texture.width,
                texture.height,
                texture.transparent,
            ) {
                Ok(slot) => return Ok(slot),
                // An empty page that can't hold it means no page ever will.
                Err(PackError::NoRoom { .. }) if page.texture_count() > 0 => index += 1,
                Err(err) => return Err(err),
            }
        }
    }
}
