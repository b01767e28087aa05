//! Helpers for pulling bit fields out of hardware registers and packing them back in.
//!
//! All bit positions are inclusive on both ends, matching the way register layouts are usually
//! written down, so `bit_range(16, 31)` is the upper half of a word.

/// Extract single bits or ranges of bits.
pub trait Bit: Sized {
    /// Extract a single bit.
    #[must_use]
    fn bit(self, n: usize) -> bool;

    /// Extract the bits from `ls` up to and including `ms`, shifted down to bit 0.
    #[must_use]
    fn bit_range(self, ls: usize, ms: usize) -> Self;
}

/// Replace single bits or ranges of bits.
pub trait BitSet: Sized {
    #[must_use]
    fn set_bit(self, n: usize, val: bool) -> Self;

    /// Overwrite the bits from `ls` to `ms` with the low bits of `val`. Bits of `val` which
    /// don't fit are ignored.
    #[must_use]
    fn set_bit_range(self, ls: usize, ms: usize, val: Self) -> Self;
}

macro_rules! impl_bits {
    ($($t:ty),*) => {
        $(
            impl Bit for $t {
                #[inline]
                fn bit(self, n: usize) -> bool {
                    (self >> n) & 1 == 1
                }

                #[inline]
                fn bit_range(self, ls: usize, ms: usize) -> Self {
                    debug_assert!(ls <= ms && ms < <$t>::BITS as usize);
                    (self >> ls) & mask::<$t>(ms - ls + 1)
                }
            }

            impl BitSet for $t {
                #[inline]
                fn set_bit(self, n: usize, val: bool) -> Self {
                    (self & !(1 << n)) | ((val as $t) << n)
                }

                #[inline]
                fn set_bit_range(self, ls: usize, ms: usize, val: Self) -> Self {
                    debug_assert!(ls <= ms && ms < <$t>::BITS as usize);
                    let mask = mask::<$t>(ms - ls + 1);
                    (self & !(mask << ls)) | ((val & mask) << ls)
                }
            }

            impl Mask for $t {
                const ONES: Self = <$t>::MAX;
                const BITS: usize = <$t>::BITS as usize;
            }
        )*
    }
}

trait Mask: Sized + std::ops::Shr<usize, Output = Self> {
    const ONES: Self;
    const BITS: usize;
}

/// A value with the `width` lowest bits set. Shifting down from all ones avoids overflowing
/// when `width` is the full width of the type.
#[inline]
fn mask<T: Mask>(width: usize) -> T {
    T::ONES >> (T::BITS - width)
}

impl_bits!(u8, u16, u32);

#[test]
fn bit_range_full_width() {
    assert_eq!(0xdead_beef_u32.bit_range(0, 31), 0xdead_beef);
    assert_eq!(0xdead_beef_u32.bit_range(16, 31), 0xdead);
    assert_eq!(0xdead_beef_u32.bit_range(0, 15), 0xbeef);
    assert_eq!(0b1011_0000_u8.bit_range(4, 7), 0b1011);
}

#[test]
fn single_bits() {
    assert!(0x8000_0000_u32.bit(31));
    assert!(!0x8000_0000_u32.bit(30));

    assert_eq!(0_u32.set_bit(2, true), 0b100);
    assert_eq!(0b111_u32.set_bit(2, false), 0b011);
}

#[test]
fn set_bit_range_masks_value() {
    assert_eq!(0_u32.set_bit_range(3, 4, 0b11), 0b11000);
    assert_eq!(0_u32.set_bit_range(0, 10, u32::MAX), 0x7ff);
    assert_eq!(u32::MAX.set_bit_range(0, 31, 0x1234), 0x1234);
    assert_eq!(0xffff_u16.set_bit_range(4, 7, 0), 0xff0f);
}
