use bytemuck::{Pod, Zeroable};

/// Premultiplied RGBA8 colour packed into one `u32`.
///
/// Byte order in memory is `r, g, b, a` on every platform, so the value can be
/// bit-cast into a vertex slot and bound directly as a `Unorm8x4` attribute.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct PackedColor(u32);

impl PackedColor {
    pub const TRANSPARENT: PackedColor = PackedColor(0);

    #[inline]
    pub const fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(rgba))
    }

    #[inline]
    pub const fn to_rgba8(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Stores the colour in an `f32` slot of the vertex log without changing its bits.
    #[inline]
    pub fn to_f32_slot(self) -> f32 {
        f32::from_bits(self.0)
    }

    #[inline]
    pub fn from_f32_slot(slot: f32) -> Self {
        Self(slot.to_bits())
    }

    #[inline]
    pub const fn alpha(self) -> u8 {
        self.to_rgba8()[3]
    }

    #[inline]
    pub const fn is_opaque(self) -> bool {
        self.alpha() == 0xff
    }

    /// Straight-alpha RGBA8, rounded. Fully transparent pixels stay zero.
    pub fn unpremultiplied(self) -> [u8; 4] {
        let [r, g, b, a] = self.to_rgba8();
        if a == 0 {
            return [0; 4];
        }
        let a32 = a as u32;
        let un = |c: u8| ((c as u32 * 255 + a32 / 2) / a32).min(255) as u8;
        [un(r), un(g), un(b), a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_slot_preserves_bits() {
        // 0xff80_0001 is a signalling-NaN pattern; it must survive the slot untouched.
        let c = PackedColor::from_bits(0xff80_0001);
        let mut log = vec![0.0f32; 1];
        log[0] = c.to_f32_slot();
        assert_eq!(PackedColor::from_f32_slot(log[0]), c);
    }

    #[test]
    fn alpha_is_last_byte() {
        let c = PackedColor::from_rgba8([1, 2, 3, 200]);
        assert_eq!(c.alpha(), 200);
        assert!(!c.is_opaque());
        assert!(PackedColor::from_rgba8([0, 0, 0, 255]).is_opaque());
    }

    #[test]
    fn unpremultiply_restores_straight_alpha() {
        assert_eq!(PackedColor::from_rgba8([128, 0, 64, 128]).unpremultiplied(), [255, 0, 128, 128]);
        assert_eq!(PackedColor::from_rgba8([9, 9, 9, 0]).unpremultiplied(), [0; 4]);
        assert_eq!(PackedColor::from_rgba8([1, 2, 3, 255]).unpremultiplied(), [1, 2, 3, 255]);
    }
}
