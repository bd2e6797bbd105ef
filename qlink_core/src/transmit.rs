//! What can travel over a channel.
//!
//! Every item sent over a channel costs the sender `pulses()` pulse lengths of
//! logical time. Particles take one pulse each; classical values take one
//! pulse per bit.

use crate::error::ArenaError;
use crate::ownership::Holder;
use rand::RngCore;

/// An item that can be sent over a channel.
///
/// The ownership hooks default to no-ops; only items that carry particle
/// handles need them.
pub trait Transmit: Send + Sized + 'static {
    /// Number of pulses it takes to emit this item.
    fn pulses(&self) -> usize;

    /// Checks that the sender may hand the item over.
    fn claim(&self) -> Result<(), ArenaError> {
        Ok(())
    }

    /// Marks the item as in transit.
    fn depart(&self) -> Result<(), ArenaError> {
        Ok(())
    }

    /// Hands the item to its receiver.
    fn arrive(&mut self, _holder: Holder) {}

    /// Disposes of an item lost in transit.
    fn lose(self, _rng: &mut dyn RngCore) {}
}

macro_rules! impl_transmit_bits {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Transmit for $ty {
                fn pulses(&self) -> usize {
                    std::mem::size_of::<$ty>() * 8
                }
            }
        )*
    };
}

impl_transmit_bits!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, char);

impl Transmit for bool {
    fn pulses(&self) -> usize {
        1
    }
}

impl Transmit for () {
    fn pulses(&self) -> usize {
        0
    }
}

impl Transmit for String {
    fn pulses(&self) -> usize {
        self.len() * 8
    }
}

impl<T: Transmit> Transmit for Option<T> {
    fn pulses(&self) -> usize {
        1 + self.as_ref().map_or(0, Transmit::pulses)
    }

    fn claim(&self) -> Result<(), ArenaError> {
        self.as_ref().map_or(Ok(()), Transmit::claim)
    }

    fn depart(&self) -> Result<(), ArenaError> {
        self.as_ref().map_or(Ok(()), Transmit::depart)
    }

    fn arrive(&mut self, holder: Holder) {
        if let Some(item) = self {
            item.arrive(holder);
        }
    }

    fn lose(self, rng: &mut dyn RngCore) {
        if let Some(item) = self {
            item.lose(rng);
        }
    }
}

impl<T: Transmit> Transmit for Vec<T> {
    fn pulses(&self) -> usize {
        self.iter().map(Transmit::pulses).sum()
    }

    fn claim(&self) -> Result<(), ArenaError> {
        self.iter().try_for_each(Transmit::claim)
    }

    fn depart(&self) -> Result<(), ArenaError> {
        self.iter().try_for_each(Transmit::depart)
    }

    fn arrive(&mut self, holder: Holder) {
        for item in self.iter_mut() {
            item.arrive(holder);
        }
    }

    fn lose(self, rng: &mut dyn RngCore) {
        for item in self {
            item.lose(rng);
        }
    }
}

impl<T: Transmit, const N: usize> Transmit for [T; N] {
    fn pulses(&self) -> usize {
        self.iter().map(Transmit::pulses).sum()
    }

    fn claim(&self) -> Result<(), ArenaError> {
        self.iter().try_for_each(Transmit::claim)
    }

    fn depart(&self) -> Result<(), ArenaError> {
        self.iter().try_for_each(Transmit::depart)
    }

    fn arrive(&mut self, holder: Holder) {
        for item in self.iter_mut() {
            item.arrive(holder);
        }
    }

    fn lose(self, rng: &mut dyn RngCore) {
        for item in self {
            item.lose(rng);
        }
    }
}

macro_rules! impl_transmit_tuple {
    ($($name:ident),+) => {
        impl<$($name: Transmit),+> Transmit for ($($name,)+) {
            #[allow(non_snake_case)]
            fn pulses(&self) -> usize {
                let ($($name,)+) = self;
                0 $(+ $name.pulses())+
            }

            #[allow(non_snake_case)]
            fn claim(&self) -> Result<(), ArenaError> {
                let ($($name,)+) = self;
                $($name.claim()?;)+
                Ok(())
            }

            #[allow(non_snake_case)]
            fn depart(&self) -> Result<(), ArenaError> {
                let ($($name,)+) = self;
                $($name.depart()?;)+
                Ok(())
            }

            #[allow(non_snake_case)]
            fn arrive(&mut self, holder: Holder) {
                let ($($name,)+) = self;
                $($name.arrive(holder);)+
            }

            #[allow(non_snake_case)]
            fn lose(self, rng: &mut dyn RngCore) {
                let ($($name,)+) = self;
                $($name.lose(rng);)+
            }
        }
    };
}

impl_transmit_tuple!(A);
impl_transmit_tuple!(A, B);
impl_transmit_tuple!(A, B, C);
impl_transmit_tuple!(A, B, C, D);
