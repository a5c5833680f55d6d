//! The bus the drivers talk through.
//!
//! Requests are non-blocking. A request is either accepted, or refused with
//! `nb::Error::WouldBlock` when the bus is busy with a previous transaction. An accepted
//! transaction then runs to completion on its own, and the requester polls for the outcome:
//! `poll` keeps returning `WouldBlock` while the transaction is processing and then reports the
//! terminal result exactly once. The transport never calls back.

use core::fmt;

pub trait I2cTransport {
    type Error: Copy + fmt::Debug;

    /// Write `data` to the device at the 7-bit `address`. The transport must have taken what it
    /// needs from `data` before returning.
    fn transmit(&mut self, address: u8, data: &[u8]) -> nb::Result<(), Self::Error>;

    /// Write `register` followed by `data` to the device at `address`.
    fn transmit_with_register(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> nb::Result<(), Self::Error>;

    /// Write `register` to the device at `address`, then read `len` bytes back. Once `poll`
    /// reports success the bytes are available from `read_received`.
    fn read_with_register(
        &mut self,
        address: u8,
        register: u8,
        len: usize,
    ) -> nb::Result<(), Self::Error>;

    /// Poll the outcome of the last accepted transaction. Polling with nothing outstanding
    /// returns `Ok(())`.
    fn poll(&mut self) -> nb::Result<(), Self::Error>;

    /// Copy the bytes of the last completed read into `buffer`, returning how many were copied.
    fn read_received(&mut self, buffer: &mut [u8]) -> usize;
}

pub mod blocking {
    //! Adapts an `embedded-hal` blocking I2C master into an `I2cTransport`. Each request is
    //! carried out on the spot; its outcome is kept and handed out by the next `poll`, so the
    //! drivers see the same request/poll sequence as with an interrupt or DMA driven bus.

    use embedded_hal::blocking::i2c::{Write, WriteRead};
    use heapless::Vec;

    use super::I2cTransport;
    use crate::command::consts::BUFFER_SIZE;

    /// Room for a full frame plus the register (control) byte.
    const TX_CAPACITY: usize = BUFFER_SIZE + 1;
    const RX_CAPACITY: usize = 16;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum BlockingI2cError<E> {
        /// Error reported by the I2C master.
        Bus(E),
        /// The request does not fit the adapter's transmit or receive buffer.
        Overrun,
    }

    pub struct BlockingI2c<I2C, E> {
        /// The I2C master the display and sensors hang off.
        i2c: I2C,
        /// Outcome of the last transaction, until it is collected by `poll`.
        outcome: Option<Result<(), E>>,
        tx: Vec<u8, TX_CAPACITY>,
        rx: [u8; RX_CAPACITY],
        rx_len: usize,
    }

    impl<I2C, E> BlockingI2c<I2C, E>
    where
        I2C: Write<Error = E> + WriteRead<Error = E>,
    {
        pub fn new(i2c: I2C) -> Self {
            Self {
                i2c,
                outcome: None,
                tx: Vec::new(),
                rx: [0; RX_CAPACITY],
                rx_len: 0,
            }
        }

        /// Give back the I2C master.
        pub fn release(self) -> I2C {
            self.i2c
        }
    }

    impl<I2C, E> I2cTransport for BlockingI2c<I2C, E>
    where
        I2C: Write<Error = E> + WriteRead<Error = E>,
        E: Copy + core::fmt::Debug,
    {
        type Error = BlockingI2cError<E>;

        fn transmit(&mut self, address: u8, data: &[u8]) -> nb::Result<(), Self::Error> {
            if self.outcome.is_some() {
                return Err(nb::Error::WouldBlock);
            }
            self.outcome = Some(self.i2c.write(address, data));
            Ok(())
        }

        fn transmit_with_register(
            &mut self,
            address: u8,
            register: u8,
            data: &[u8],
        ) -> nb::Result<(), Self::Error> {
            if self.outcome.is_some() {
                return Err(nb::Error::WouldBlock);
            }
            self.tx.clear();
            self.tx
                .push(register)
                .map_err(|_| nb::Error::Other(BlockingI2cError::Overrun))?;
            self.tx
                .extend_from_slice(data)
                .map_err(|_| nb::Error::Other(BlockingI2cError::Overrun))?;
            self.outcome = Some(self.i2c.write(address, &self.tx));
            Ok(())
        }

        fn read_with_register(
            &mut self,
            address: u8,
            register: u8,
            len: usize,
        ) -> nb::Result<(), Self::Error> {
            if self.outcome.is_some() {
                return Err(nb::Error::WouldBlock);
            }
            if len > RX_CAPACITY {
                return Err(nb::Error::Other(BlockingI2cError::Overrun));
            }
            let outcome = self.i2c.write_read(address, &[register], &mut self.rx[..len]);
            self.rx_len = if outcome.is_ok() { len } else { 0 };
            self.outcome = Some(outcome);
            Ok(())
        }

        fn poll(&mut self) -> nb::Result<(), Self::Error> {
            match self.outcome.take() {
                Some(Err(e)) => Err(nb::Error::Other(BlockingI2cError::Bus(e))),
                Some(Ok(())) | None => Ok(()),
            }
        }

        fn read_received(&mut self, buffer: &mut [u8]) -> usize {
            let len = self.rx_len.min(buffer.len());
            buffer[..len].copy_from_slice(&self.rx[..len]);
            len
        }
    }

}

#[cfg(test)]
pub mod test_spy {
    //! A transport for use in unit tests that records whatever was sent to it and lets the test
    //! script how the bus answers.

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec;

    use super::I2cTransport;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum SpyError {
        Nack,
        ArbitrationLost,
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Sent {
        Write(u8, Vec<u8>),
        WriteRegister(u8, u8, Vec<u8>),
        ReadRegister(u8, u8, usize),
    }

    #[derive(Default)]
    struct Bus {
        sent: Vec<Sent>,
        /// Number of polls a transaction stays "processing" for.
        latency: usize,
        remaining: usize,
        outstanding: bool,
        refuse: usize,
        failures: VecDeque<Option<SpyError>>,
        reads: VecDeque<Vec<u8>>,
        pending_read: bool,
        received: Vec<u8>,
    }

    /// Cloning (or `split`) yields another handle on the same recorded bus, so a test can keep
    /// one handle after moving the other into a driver.
    #[derive(Clone, Default)]
    pub struct TestSpyTransport {
        bus: Rc<RefCell<Bus>>,
    }

    impl TestSpyTransport {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn split(&self) -> Self {
            self.clone()
        }
        pub fn set_latency(&self, polls: usize) {
            self.bus.borrow_mut().latency = polls;
        }
        /// Refuse the next `n` requests as busy.
        pub fn refuse_next(&self, n: usize) {
            self.bus.borrow_mut().refuse = n;
        }
        /// Finish the next accepted transaction with `err`.
        pub fn fail_next(&self, err: SpyError) {
            self.bus.borrow_mut().failures.push_back(Some(err));
        }
        /// Let the next `successes` accepted transactions succeed, then fail the one after with
        /// `err`.
        pub fn fail_after(&self, successes: usize, err: SpyError) {
            let mut bus = self.bus.borrow_mut();
            for _ in 0..successes {
                bus.failures.push_back(None);
            }
            bus.failures.push_back(Some(err));
        }
        /// Bytes returned by the next read.
        pub fn queue_read(&self, data: &[u8]) {
            self.bus.borrow_mut().reads.push_back(data.to_vec());
        }
        pub fn sent(&self) -> Vec<Sent> {
            self.bus.borrow().sent.clone()
        }
        pub fn is_outstanding(&self) -> bool {
            self.bus.borrow().outstanding
        }
        pub fn check_multi(&self, expected: &[Sent]) {
            assert_eq!(self.bus.borrow().sent, expected);
        }
        pub fn clear(&self) {
            self.bus.borrow_mut().sent.clear()
        }

        fn accept(&self, sent: Sent) -> nb::Result<(), SpyError> {
            let mut bus = self.bus.borrow_mut();
            if bus.refuse > 0 {
                bus.refuse -= 1;
                return Err(nb::Error::WouldBlock);
            }
            if bus.outstanding {
                return Err(nb::Error::WouldBlock);
            }
            bus.pending_read = matches!(sent, Sent::ReadRegister(..));
            bus.sent.push(sent);
            bus.outstanding = true;
            bus.remaining = bus.latency;
            Ok(())
        }
    }

    impl I2cTransport for TestSpyTransport {
        type Error = SpyError;

        fn transmit(&mut self, address: u8, data: &[u8]) -> nb::Result<(), SpyError> {
            self.accept(Sent::Write(address, data.to_vec()))
        }

        fn transmit_with_register(
            &mut self,
            address: u8,
            register: u8,
            data: &[u8],
        ) -> nb::Result<(), SpyError> {
            self.accept(Sent::WriteRegister(address, register, data.to_vec()))
        }

        fn read_with_register(
            &mut self,
            address: u8,
            register: u8,
            len: usize,
        ) -> nb::Result<(), SpyError> {
            self.accept(Sent::ReadRegister(address, register, len))
        }

        fn poll(&mut self) -> nb::Result<(), SpyError> {
            let mut bus = self.bus.borrow_mut();
            if !bus.outstanding {
                return Ok(());
            }
            if bus.remaining > 0 {
                bus.remaining -= 1;
                return Err(nb::Error::WouldBlock);
            }
            bus.outstanding = false;
            if let Some(err) = bus.failures.pop_front().flatten() {
                return Err(nb::Error::Other(err));
            }
            if bus.pending_read {
                bus.received = bus.reads.pop_front().unwrap_or_default();
            }
            Ok(())
        }

        fn read_received(&mut self, buffer: &mut [u8]) -> usize {
            let bus = self.bus.borrow();
            let len = bus.received.len().min(buffer.len());
            buffer[..len].copy_from_slice(&bus.received[..len]);
            len
        }
    }
}
