// Licensed under the Apache-2.0 license

//! I2C master protocol engine.
//!
//! Implements the bus state machine - start condition, address framing,
//! byte-level ACK/NACK handshaking, stop condition - over the
//! [`I2cHardware`] register seam, plus the composite read/write/scan
//! operations and the embedded-hal `I2c` trait on top of them.
//!
//! Every composite operation guarantees a stop condition on every exit
//! path, success or failure; the engine never returns with the bus held
//! mid-transaction. Every wait on a hardware flag is bounded by the
//! configured poll limit and reports [`Error::BusTimeout`] when exhausted.

use crate::codec::FixedInt;
use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::I2cConfig;
use crate::i2c::traits::{BusEvent, Direction, I2cHardware};
use crate::status::{StatusCode, StatusKind};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};

/// First and last addresses probed by [`I2cController::scan`]. The ranges
/// outside are reserved by the protocol (general call, 10-bit prefixes).
const SCAN_FIRST: u8 = 0x08;
const SCAN_LAST: u8 = 0x77;

/// Width of the staging buffer for typed register access; sized for the
/// largest fixed-width integer.
const SCRATCH_LEN: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Slave did not acknowledge the address or a data byte.
    NotAcknowledged(NoAcknowledgeSource),
    /// Hardware never raised its completion flag within the poll bound.
    BusTimeout,
    /// Illegal start/stop or other electrical fault reported by hardware.
    Bus,
    /// Lost arbitration to another master.
    ArbitrationLost,
    /// Operation attempted on a device that is not open.
    NotOpen,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::NotAcknowledged(source) => ErrorKind::NoAcknowledge(*source),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::Bus => ErrorKind::Bus,
            Error::BusTimeout | Error::NotOpen => ErrorKind::Other,
        }
    }
}

impl From<Error> for StatusKind {
    fn from(err: Error) -> Self {
        match err {
            Error::NotAcknowledged(_) => StatusKind::NotAcknowledged,
            Error::BusTimeout => StatusKind::BusTimeout,
            Error::ArbitrationLost => StatusKind::ArbitrationLost,
            Error::Bus | Error::NotOpen => StatusKind::BusError,
        }
    }
}

/// Packs an operation result into the 32-bit status word.
impl From<Result<u16, Error>> for StatusCode {
    fn from(result: Result<u16, Error>) -> Self {
        match result {
            Ok(payload) => StatusCode::ok(payload),
            Err(err) => StatusCode::err(err.into()),
        }
    }
}

/// I2C master engine over one hardware instance.
///
/// `scratch` is the device-owned staging area for typed register access;
/// it is reused across calls and never retained between them.
pub struct I2cController<H: I2cHardware, D: DelayNs, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub config: I2cConfig,
    pub logger: L,
    delay: D,
    scratch: [u8; SCRATCH_LEN],
    open: bool,
}

impl<H: I2cHardware, D: DelayNs> I2cController<H, D, NoOpLogger> {
    pub fn new(hardware: H, delay: D, config: I2cConfig) -> Self {
        Self::with_logger(hardware, delay, config, NoOpLogger)
    }
}

impl<H: I2cHardware, D: DelayNs, L: Logger> I2cController<H, D, L> {
    pub fn with_logger(hardware: H, delay: D, config: I2cConfig, logger: L) -> Self {
        Self {
            hardware,
            config,
            logger,
            delay,
            scratch: [0; SCRATCH_LEN],
            open: false,
        }
    }

    /// Configure and enable the peripheral. Idempotent: a second `open`
    /// without an intervening [`Self::close`] touches no hardware state.
    pub fn open(&mut self) {
        if self.open {
            return;
        }
        self.hardware.configure(&self.config);
        self.hardware.enable();
        self.open = true;
        self.logger.log("i2c: open");
    }

    /// Disable the peripheral. Safe to call on an unopened device.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.hardware.disable();
        self.open = false;
        self.logger.log("i2c: close");
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Close-then-open recovery path for unrecoverable bus conditions.
    /// Never invoked by the engine itself; higher layers decide when to
    /// recover.
    pub fn reset(&mut self) {
        self.logger.log("i2c: reset");
        self.close();
        self.open();
    }

    /// Probe every 7-bit address and report how many acknowledged.
    ///
    /// A NACK means "no device here", not an error; only genuine bus
    /// faults propagate. The bus is returned to idle after each probe.
    ///
    /// # Errors
    ///
    /// Returns the first bus fault or timeout encountered while probing.
    pub fn scan(&mut self) -> Result<u16, Error> {
        self.ensure_open()?;
        let mut count = 0u16;
        for addr in SCAN_FIRST..=SCAN_LAST {
            if self.probe(addr)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Like [`Self::scan`] but also records the responding addresses.
    /// Addresses beyond the vector's capacity are counted but not stored.
    ///
    /// # Errors
    ///
    /// Returns the first bus fault or timeout encountered while probing.
    pub fn scan_into<const CAP: usize>(
        &mut self,
        found: &mut heapless::Vec<u8, CAP>,
    ) -> Result<u16, Error> {
        self.ensure_open()?;
        let mut count = 0u16;
        for addr in SCAN_FIRST..=SCAN_LAST {
            if self.probe(addr)? {
                count += 1;
                found.push(addr).ok();
            }
        }
        Ok(count)
    }

    /// Register write: start, address+W, register byte, data bytes, stop.
    ///
    /// # Errors
    ///
    /// Aborts at the first NACK, fault or timeout. The stop condition is
    /// still issued before the error is returned.
    pub fn write(&mut self, addr: u8, reg: u8, buf: &[u8]) -> Result<u16, Error> {
        self.ensure_open()?;
        self.wait_busy()?;
        self.with_stop_guard(|bus| {
            bus.start(addr, Direction::Write)?;
            bus.send_byte(reg)?;
            bus.send_all(buf)
        })
    }

    /// Register read: start, address+W, register byte, repeated start,
    /// address+R, data bytes, stop. All received bytes but the last are
    /// acknowledged; the last is NACKed to terminate the read.
    ///
    /// # Errors
    ///
    /// Aborts at the first NACK, fault or timeout, stop always issued.
    pub fn read(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<u16, Error> {
        self.ensure_open()?;
        self.wait_busy()?;
        self.with_stop_guard(|bus| {
            bus.start(addr, Direction::Write)?;
            bus.send_byte(reg)?;
            bus.start(addr, Direction::Read)?;
            bus.receive_all(buf)
        })
    }

    /// Multi-byte read without the register-select phase.
    ///
    /// With `stop_comm` false the stop condition is left to a subsequent
    /// call, supporting compound sequences whose address selection
    /// happened elsewhere. On error the stop is issued regardless; the bus
    /// is never left mid-transaction.
    ///
    /// # Errors
    ///
    /// Propagates the first NACK, fault or timeout.
    pub fn read_raw(&mut self, addr: u8, buf: &mut [u8], stop_comm: bool) -> Result<u16, Error> {
        self.ensure_open()?;
        self.wait_busy()?;
        if stop_comm {
            self.with_stop_guard(|bus| {
                bus.start(addr, Direction::Read)?;
                bus.receive_all(buf)
            })
        } else {
            let result = self
                .start(addr, Direction::Read)
                .and_then(|()| self.receive_all(buf));
            match result {
                Ok(count) => Ok(count),
                Err(err) => {
                    // Error path still cleans up; only a successful
                    // deferred read leaves the bus held.
                    let _ = self.stop();
                    Err(err)
                }
            }
        }
    }

    /// Multi-byte write without the register-select phase.
    ///
    /// # Errors
    ///
    /// Propagates the first NACK, fault or timeout, stop always issued.
    pub fn write_raw(&mut self, addr: u8, buf: &[u8]) -> Result<u16, Error> {
        self.ensure_open()?;
        self.wait_busy()?;
        self.with_stop_guard(|bus| {
            bus.start(addr, Direction::Write)?;
            bus.send_all(buf)
        })
    }

    /// Typed register write staged through the scratch buffer; the value
    /// goes out big-endian.
    ///
    /// # Errors
    ///
    /// Propagates the first NACK, fault or timeout.
    pub fn write_reg<T: FixedInt>(&mut self, addr: u8, reg: u8, value: T) -> Result<u16, Error> {
        // Scratch holds the widest fixed-width integer, so encoding cannot
        // fail.
        value.put_be(&mut self.scratch).map_err(|_| Error::Bus)?;
        let staged = self.scratch;
        let data = staged.get(..T::SIZE).ok_or(Error::Bus)?;
        self.write(addr, reg, data)
    }

    /// Typed register read staged through the scratch buffer.
    ///
    /// # Errors
    ///
    /// Propagates the first NACK, fault or timeout.
    pub fn read_reg<T: FixedInt>(&mut self, addr: u8, reg: u8) -> Result<T, Error> {
        let mut staged = [0u8; SCRATCH_LEN];
        let buf = staged.get_mut(..T::SIZE).ok_or(Error::Bus)?;
        self.read(addr, reg, buf)?;
        self.scratch = staged;
        T::from_be(&staged).map_err(|_| Error::Bus)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.open {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }

    /// Runs `body` and issues a stop condition on every exit path.
    fn with_stop_guard(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<u16, Error>,
    ) -> Result<u16, Error> {
        let result = body(self);
        let stop_result = self.stop();
        match result {
            Ok(count) => stop_result.map(|()| count),
            Err(err) => Err(err),
        }
    }

    /// Generate a (repeated) start condition and transmit the address
    /// frame.
    fn start(&mut self, addr: u8, direction: Direction) -> Result<(), Error> {
        self.hardware.trigger_start();
        self.wait_transfer()?;
        match self.hardware.bus_event() {
            BusEvent::StartSent | BusEvent::RepeatedStartSent => {}
            BusEvent::ArbitrationLost => return Err(Error::ArbitrationLost),
            _ => return Err(Error::Bus),
        }
        self.hardware.write_data((addr << 1) | direction as u8);
        self.wait_transfer()?;
        match self.hardware.bus_event() {
            BusEvent::AddressAcked => Ok(()),
            BusEvent::AddressNacked => {
                Err(Error::NotAcknowledged(NoAcknowledgeSource::Address))
            }
            BusEvent::ArbitrationLost => Err(Error::ArbitrationLost),
            _ => Err(Error::Bus),
        }
    }

    /// Generate a stop condition and wait for the bus to go idle.
    fn stop(&mut self) -> Result<(), Error> {
        self.hardware.trigger_stop();
        self.wait_busy()
    }

    fn send_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.hardware.write_data(byte);
        self.wait_transfer()?;
        match self.hardware.bus_event() {
            BusEvent::DataAcked => Ok(()),
            BusEvent::DataNacked => Err(Error::NotAcknowledged(NoAcknowledgeSource::Data)),
            BusEvent::ArbitrationLost => Err(Error::ArbitrationLost),
            _ => Err(Error::Bus),
        }
    }

    fn receive_byte(&mut self, ack: bool) -> Result<u8, Error> {
        self.hardware.start_receive(ack);
        self.wait_transfer()?;
        let expected = if ack {
            BusEvent::ByteReceivedAcked
        } else {
            BusEvent::ByteReceivedNacked
        };
        match self.hardware.bus_event() {
            event if event == expected => Ok(self.hardware.read_data()),
            BusEvent::ArbitrationLost => Err(Error::ArbitrationLost),
            _ => Err(Error::Bus),
        }
    }

    fn send_all(&mut self, buf: &[u8]) -> Result<u16, Error> {
        let mut sent = 0u16;
        for &byte in buf {
            self.send_byte(byte)?;
            sent = sent.saturating_add(1);
        }
        Ok(sent)
    }

    fn receive_all(&mut self, buf: &mut [u8]) -> Result<u16, Error> {
        let last = buf.len().saturating_sub(1);
        let mut received = 0u16;
        for (index, slot) in buf.iter_mut().enumerate() {
            *slot = self.receive_byte(index < last)?;
            received = received.saturating_add(1);
        }
        Ok(received)
    }

    /// Address one probe during a scan. NACK maps to "absent".
    fn probe(&mut self, addr: u8) -> Result<bool, Error> {
        self.wait_busy()?;
        let outcome = self.start(addr, Direction::Write);
        let stop_result = self.stop();
        let present = match outcome {
            Ok(()) => true,
            Err(Error::NotAcknowledged(_)) => false,
            Err(err) => return Err(err),
        };
        stop_result?;
        Ok(present)
    }

    /// Bounded wait for the transfer-complete flag.
    fn wait_transfer(&mut self) -> Result<(), Error> {
        for _ in 0..self.config.poll_limit {
            if self.hardware.transfer_complete() {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        Err(Error::BusTimeout)
    }

    /// Bounded wait for any in-flight stop condition to finish.
    fn wait_busy(&mut self) -> Result<(), Error> {
        for _ in 0..self.config.poll_limit {
            if !self.hardware.stop_pending() {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        Err(Error::BusTimeout)
    }
}

impl<H: I2cHardware, D: DelayNs, L: Logger> embedded_hal::i2c::ErrorType
    for I2cController<H, D, L>
{
    type Error = Error;
}

impl<H: I2cHardware, D: DelayNs, L: Logger> embedded_hal::i2c::I2c for I2cController<H, D, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.read_raw(addr, buffer, true).map(|_| ())
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_raw(addr, bytes).map(|_| ())
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.ensure_open()?;
        self.wait_busy()?;
        self.with_stop_guard(|bus| {
            bus.start(addr, Direction::Write)?;
            bus.send_all(bytes)?;
            bus.start(addr, Direction::Read)?;
            bus.receive_all(buffer)
        })
        .map(|_| ())
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;
        self.wait_busy()?;
        self.with_stop_guard(|bus| {
            let mut previous: Option<Direction> = None;
            for operation in operations.iter_mut() {
                match operation {
                    Operation::Write(bytes) => {
                        if previous != Some(Direction::Write) {
                            bus.start(addr, Direction::Write)?;
                        }
                        bus.send_all(bytes)?;
                        previous = Some(Direction::Write);
                    }
                    Operation::Read(buffer) => {
                        // Each read op terminates with a NACK, so back-to-back
                        // reads get a repeated start in between.
                        bus.start(addr, Direction::Read)?;
                        bus.receive_all(buffer)?;
                        previous = Some(Direction::Read);
                    }
                }
            }
            Ok(0)
        })
        .map(|_| ())
    }
}
