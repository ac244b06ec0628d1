use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

pub const PIXEL_COUNT: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Monochrome 64x32 frame buffer, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Display {
    pixels: [bool; PIXEL_COUNT],
}

impl Default for Display {
    fn default() -> Self {
        Self {
            pixels: [false; PIXEL_COUNT],
        }
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.pixels.iter().filter(|p| **p).count();
        f.debug_struct("Display").field("lit", &lit).finish()
    }
}

impl Display {
    pub fn clear(&mut self) {
        self.pixels = [false; PIXEL_COUNT];
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[(y % SCREEN_HEIGHT) * SCREEN_WIDTH + (x % SCREEN_WIDTH)]
    }

    /// XOR one sprite row (MSB = leftmost pixel) onto the screen at `(x, y)`,
    /// wrapping at the edges. Returns `(changed, collided)`: whether any pixel
    /// flipped, and whether any lit pixel was turned off.
    pub fn xor_row(&mut self, x: usize, y: usize, bits: u8) -> (bool, bool) {
        let row = (y % SCREEN_HEIGHT) * SCREEN_WIDTH;
        let mut changed = false;
        let mut collided = false;
        for col in 0..8 {
            if (bits >> (7 - col)) & 0x1 == 0 {
                continue;
            }
            let pixel = &mut self.pixels[row + (x + col) % SCREEN_WIDTH];
            collided |= *pixel;
            *pixel = !*pixel;
            changed = true;
        }
        (changed, collided)
    }

    pub fn pixels(&self) -> &[bool; PIXEL_COUNT] {
        &self.pixels
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks_exact(SCREEN_WIDTH)
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| !p)
    }
}

/// Owned snapshot of the display handed to render sinks.
pub type Frame = Display;
