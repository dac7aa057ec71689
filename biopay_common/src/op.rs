//! Boilerplate for arithmetic on single-field numeric newtypes.

/// Implements a `std::ops` trait for a tuple newtype by delegating to the wrapped value.
///
/// * `binary` implements `T op T -> T`
/// * `inplace` implements `T op= T`
/// * `unary` implements `op T -> T`
/// * `scalar` implements `T op $rhs -> T` for a primitive right hand side
#[macro_export]
macro_rules! op {
    (binary $for_struct:ident, $impl_trait:ident, $impl_fn:ident) => {
        impl $impl_trait for $for_struct {
            type Output = Self;

            fn $impl_fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$impl_fn(rhs.0))
            }
        }
    };

    (inplace $for_struct:ident, $impl_trait:ident, $impl_fn:ident) => {
        impl $impl_trait for $for_struct {
            fn $impl_fn(&mut self, rhs: Self) {
                self.0.$impl_fn(rhs.0)
            }
        }
    };

    (unary $for_struct:ident, $impl_trait:ident, $impl_fn:ident) => {
        impl $impl_trait for $for_struct {
            type Output = Self;

            fn $impl_fn(self) -> Self::Output {
                Self(self.0.$impl_fn())
            }
        }
    };

    (scalar $for_struct:ident, $impl_trait:ident, $impl_fn:ident, $rhs:ty) => {
        impl $impl_trait<$rhs> for $for_struct {
            type Output = Self;

            fn $impl_fn(self, rhs: $rhs) -> Self::Output {
                Self(self.0.$impl_fn(rhs))
            }
        }
    };
}
