mod deserializer;

pub use deserializer::*;

use std::io::Read;

use anyhow::{anyhow, Context};

pub trait Deserialize: Sized {
    fn deserialize(deserializer: &mut Deserializer<impl Read>) -> anyhow::Result<Self>;
}

macro_rules! deserialize_primitive_le {
    ($T:ty) => {
        impl Deserialize for $T {
            fn deserialize(deserializer: &mut Deserializer<impl Read>) -> anyhow::Result<Self> {
                let mut buf = [0; std::mem::size_of::<$T>()];
                deserializer.read_bytes(&mut buf)?;
                Ok(<$T>::from_le_bytes(buf))
            }
        }
    };
}

deserialize_primitive_le!(u8);
deserialize_primitive_le!(u16);
deserialize_primitive_le!(u32);
deserialize_primitive_le!(u64);

deserialize_primitive_le!(i8);
deserialize_primitive_le!(i16);
deserialize_primitive_le!(i32);
deserialize_primitive_le!(i64);

deserialize_primitive_le!(f32);
deserialize_primitive_le!(f64);

impl<T, const N: usize> Deserialize for [T; N]
where
    T: Deserialize,
{
    fn deserialize(deserializer: &mut Deserializer<impl Read>) -> anyhow::Result<Self> {
        let mut elements = Vec::with_capacity(N);
        for i in 0..N {
            elements.push(deserializer.deserialize::<T>().with_context(|| {
                format!("cannot deserialize array element {i} (array of length {N})")
            })?);
        }
        elements
            .try_into()
            .map_err(|_| anyhow!("array element count mismatch"))
    }
}

impl<R> Deserializer<R> {
    pub fn deserialize<T>(&mut self) -> anyhow::Result<T>
    where
        R: Read,
        T: Deserialize,
    {
        T::deserialize(self)
    }
}

pub fn deserialize<T>(buffer: &[u8]) -> anyhow::Result<T>
where
    T: Deserialize,
{
    T::deserialize(&mut Deserializer::from_buffer(buffer))
}
