/*!
    transmit engine

    the hardware only holds one byte at a time, the engine keeps the second byte of the pair in flight
    and feeds it on the next transmit-empty interrupt, so both bytes of a pair always leave back to back.
*/

use log::*;

use crate::{
    Error,
    command::Pair,
    ringbuffer::RingBuffer,
    };


/// what the transmit engine needs from the UART peripheral
pub trait Uart {
    /// put a byte in the transmit data register
    fn write_data(&mut self, byte: u8);
    /// the transmit data register can accept a new byte
    fn data_register_empty(&self) -> bool;
    /// the transmit-empty interrupt is enabled
    fn tx_interrupt_enabled(&self) -> bool;
    /// enable or disable the transmit-empty interrupt
    fn set_tx_interrupt(&mut self, enable: bool);
}

pub struct Transmitter<U> {
    uart: U,
    /// data byte of the pair currently on the wire
    second: u8,
    /// the unit byte is gone, `second` must be sent next
    mid_pair: bool,
}

impl<U: Uart> Transmitter<U> {
    pub const fn new(uart: U) -> Self {
        Self {
            uart,
            second: 0,
            mid_pair: false,
        }
    }

    /**
        accept a pair without blocking

        - with a queue, the pair is appended and the interrupt takes it from there. Fails with [Error::QueueFull] only.
        - without a queue, the unit byte is written immediately. Fails with [Error::Busy] when the data register is still occupied or the previous pair is not completely handed over.

        on failure nothing was sent and nothing changed
    */
    pub fn submit<const N: usize>(&mut self, queue: &RingBuffer<N>, pair: Pair) -> Result<(), Error> {
        if N == 0 {
            if !self.uart.data_register_empty() || self.uart.tx_interrupt_enabled()
                {return Err(Error::Busy)}
            self.uart.write_data(pair.unit.into());
            self.second = pair.data;
            self.mid_pair = true;
            self.uart.set_tx_interrupt(true);
        }
        else {
            queue.push(pair).map_err(|_| Error::QueueFull)?;
            if !self.uart.tx_interrupt_enabled() {
                self.uart.set_tx_interrupt(true);
            }
        }
        trace!("submitted {:?}", pair);
        Ok(())
    }

    /// body of the transmit-empty interrupt
    pub fn on_ready<const N: usize>(&mut self, queue: &RingBuffer<N>) {
        if self.mid_pair {
            self.uart.write_data(self.second);
            self.mid_pair = false;
            if queue.is_empty() {
                self.uart.set_tx_interrupt(false);
            }
        }
        else if let Some(pair) = queue.pop() {
            self.uart.write_data(pair.unit.into());
            self.second = pair.data;
            self.mid_pair = true;
        }
        else {
            // nothing left, go idle until the next submission
            self.uart.set_tx_interrupt(false);
        }
    }

    /// a pair is partially sent or waiting in the queue
    pub fn is_busy<const N: usize>(&self, queue: &RingBuffer<N>) -> bool {
        self.mid_pair || !queue.is_empty()
    }
    pub fn uart(&self) -> &U {&self.uart}
    pub fn uart_mut(&mut self) -> &mut U {&mut self.uart}
}


#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::command::{AccessMode, UnitByte};
    use std::vec::Vec;

    /// UART whose data register empties only when told to
    #[derive(Default)]
    pub struct MockUart {
        pub wire: Vec<u8>,
        pub holding: Option<u8>,
        pub interrupt: bool,
    }
    impl MockUart {
        /// shift the held byte out, as the hardware would after one frame time
        pub fn shift(&mut self) -> bool {
            match self.holding.take() {
                Some(byte) => {self.wire.push(byte); true},
                None => false,
            }
        }
    }
    impl Uart for MockUart {
        fn write_data(&mut self, byte: u8) {
            assert!(self.holding.is_none(), "data register overwritten");
            self.holding = Some(byte);
        }
        fn data_register_empty(&self) -> bool {self.holding.is_none()}
        fn tx_interrupt_enabled(&self) -> bool {self.interrupt}
        fn set_tx_interrupt(&mut self, enable: bool) {self.interrupt = enable}
    }

    fn pair(unit: u8, data: u8) -> Pair {
        Pair::new(UnitByte::with_mode(unit, AccessMode::Mode0), data)
    }
    /// run the hardware until the transmitter goes idle
    fn flush<const N: usize>(transmit: &mut Transmitter<MockUart>, queue: &RingBuffer<N>) {
        loop {
            transmit.uart_mut().shift();
            if !transmit.uart().interrupt
                {break}
            transmit.on_ready(queue);
        }
        transmit.uart_mut().shift();
    }

    #[test]
    fn queueless_accepts_one_pair_at_a_time() {
        let queue = RingBuffer::<0>::new();
        let mut transmit = Transmitter::new(MockUart::default());

        assert_eq!(transmit.submit(&queue, pair(3, 0x41)), Ok(()));
        assert_eq!(transmit.submit(&queue, pair(4, 0x42)), Err(Error::Busy));
        // unit byte left the register, data byte still pending
        transmit.uart_mut().shift();
        assert_eq!(transmit.submit(&queue, pair(4, 0x42)), Err(Error::Busy));
        transmit.on_ready(&queue);
        assert!(!transmit.uart().interrupt);
        // data byte still in the register
        assert_eq!(transmit.submit(&queue, pair(4, 0x42)), Err(Error::Busy));
        transmit.uart_mut().shift();

        assert_eq!(transmit.submit(&queue, pair(4, 0x42)), Ok(()));
        flush(&mut transmit, &queue);
        assert_eq!(transmit.uart().wire, [3, 0x41, 4, 0x42]);
    }

    #[test]
    fn queued_pairs_leave_in_order() {
        let queue = RingBuffer::<4>::new();
        let mut transmit = Transmitter::new(MockUart::default());
        for i in 0 .. 4 {
            transmit.submit(&queue, pair(10 + i, i)).unwrap();
        }
        assert_eq!(transmit.submit(&queue, pair(20, 0)), Err(Error::QueueFull));
        assert!(transmit.uart().interrupt);

        flush(&mut transmit, &queue);
        assert_eq!(transmit.uart().wire, [10, 0, 11, 1, 12, 2, 13, 3]);
        assert!(!transmit.is_busy(&queue));
    }

    #[test]
    fn interrupt_stays_enabled_while_second_byte_pending() {
        let queue = RingBuffer::<2>::new();
        let mut transmit = Transmitter::new(MockUart::default());
        transmit.submit(&queue, pair(1, 0xaa)).unwrap();
        transmit.on_ready(&queue);
        // queue drained but the data byte is still owed
        assert!(queue.is_empty());
        assert!(transmit.uart().interrupt);
        assert!(transmit.is_busy(&queue));

        // a submission arriving mid pair is sent after it
        transmit.submit(&queue, pair(2, 0xbb)).unwrap();
        flush(&mut transmit, &queue);
        assert_eq!(transmit.uart().wire, [1, 0xaa, 2, 0xbb]);
    }
}
