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

//! A minimal, dependency-free replacement for the `bitflags` crate.

/// Declares a transparent flag-set newtype over an unsigned integer.
///
/// The generated type supports `|`, `&`, `contains`, `intersects`, `empty`,
/// `bits`, and `from_bits_truncate`.
#[macro_export]
macro_rules! umbra_bitflags {
    (
        $(#[$outer:meta])*
        pub struct $name:ident: $repr:ty {
            $(
                $(#[$inner:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name {
            bits: $repr,
        }

        impl $name {
            $(
                $(#[$inner])*
                pub const $flag: Self = Self { bits: $value };
            )*

            /// Returns a set with no flags.
            #[inline]
            pub const fn empty() -> Self {
                Self { bits: 0 }
            }

            /// Returns the raw bits.
            #[inline]
            pub const fn bits(&self) -> $repr {
                self.bits
            }

            /// Builds a set from raw bits, dropping nothing.
            #[inline]
            pub const fn from_bits_truncate(bits: $repr) -> Self {
                Self { bits }
            }

            /// Returns `true` if every flag in `other` is also set in `self`.
            #[inline]
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if any flag in `other` is set in `self`.
            #[inline]
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Returns `true` if no flag is set.
            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;
            #[inline]
            fn bitor(self, rhs: Self) -> Self {
                Self { bits: self.bits | rhs.bits }
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, rhs: Self) {
                self.bits |= rhs.bits;
            }
        }

        impl ::std::ops::BitAnd for $name {
            type Output = Self;
            #[inline]
            fn bitand(self, rhs: Self) -> Self {
                Self { bits: self.bits & rhs.bits }
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.bits)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    umbra_bitflags! {
        pub struct TestFlags: u32 {
            const A = 1 << 0;
            const B = 1 << 1;
            const C = 1 << 2;
        }
    }

    #[test]
    fn test_flag_set_operations() {
        let ab = TestFlags::A | TestFlags::B;
        assert!(ab.contains(TestFlags::A));
        assert!(ab.contains(TestFlags::A | TestFlags::B));
        assert!(!ab.contains(TestFlags::C));
        assert!(ab.intersects(TestFlags::B | TestFlags::C));
        assert_eq!((ab & TestFlags::B).bits(), 2);
        assert!(TestFlags::empty().is_empty());
    }
}
