/*!
    fixed capacity FIFO of outbound pairs

    pairs are stored packed on 16 bits and leave in the exact order they entered.
    Both ends lock the queue internally, so the foreground producer and the transmit interrupt can use it without an external lock.
*/

use crate::{
    command::Pair,
    mutex::IrqMutex,
    };


pub struct RingBuffer<const N: usize> {
    inner: IrqMutex<Ring<N>>,
}
struct Ring<const N: usize> {
    slots: [u16; N],
    free: usize,
    read: usize,
    write: usize,
}

impl<const N: usize> RingBuffer<N> {
    const EVEN: () = assert!(N % 2 == 0, "outbound queue capacity must be even");
    const FITS: () = assert!(N <= u8::MAX as usize, "outbound queue capacity must fit its 8 bit indices");

    pub const fn new() -> Self {
        let () = Self::EVEN;
        let () = Self::FITS;
        Self {inner: IrqMutex::new(Ring {
            slots: [0; N],
            free: N,
            read: 0,
            write: 0,
            })}
    }
    /// number of pairs the queue can hold
    pub const fn capacity(&self) -> usize {N}

    /// append a pair, giving it back if the queue is full
    pub fn push(&self, pair: Pair) -> Result<(), Pair> {
        let mut ring = self.inner.lock();
        if ring.free == 0
            {return Err(pair)}
        let index = ring.write;
        ring.slots[index] = pair.into();
        ring.write = (index + 1) % N;
        ring.free -= 1;
        Ok(())
    }
    /// remove the oldest pair
    pub fn pop(&self) -> Option<Pair> {
        let mut ring = self.inner.lock();
        if ring.free == N
            {return None}
        let index = ring.read;
        ring.read = (index + 1) % N;
        ring.free += 1;
        Some(Pair::from(ring.slots[index]))
    }
    pub fn free_slots(&self) -> usize {
        self.inner.lock().free
    }
    pub fn len(&self) -> usize {
        N - self.free_slots()
    }
    pub fn is_empty(&self) -> bool {
        self.free_slots() == N
    }
    pub fn is_full(&self) -> bool {
        self.free_slots() == 0
    }
}
impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {Self::new()}
}
