// Licensed under the Apache-2.0 license

//! UART engine: interrupt-fed ring buffers with blocking and
//! non-blocking send/receive layered on top.
//!
//! Two concurrency domains touch this type: mainline code calling the
//! public operations, and the hardware interrupt invoking [`on_recv`] /
//! [`on_send`]. The receive ring is written only by the handler and read
//! only by mainline; the transmit ring the other way around. That
//! single-writer discipline is what makes the ring's plain atomic index
//! updates sufficient.
//!
//! The blocking paths busy-wait in place - there is no scheduler to
//! yield to. While waiting for transmit room they check the global
//! interrupt flag: if interrupts are disabled at the call site the
//! transmit-empty interrupt can never fire, so the engine invokes the
//! handler logic itself. Omitting that pump would deadlock any caller
//! that fills the ring with interrupts masked; both the asynchronous
//! entry point and the fallback run the same [`on_send`] body.
//!
//! [`on_recv`]: UartController::on_recv
//! [`on_send`]: UartController::on_send

use core::sync::atomic::{AtomicU8, Ordering};

use crate::uart::common::{Config, Direction, Error, ErrorFlags, RecvStatus};
use crate::uart::ring::RingBuffer;
use crate::uart::traits::UartHardware;
use embedded_hal::delay::DelayNs;
use fugit::MillisDurationU32;

/// Busy-wait granularity for the bounded send/receive loops. Timeout
/// accuracy is limited to this step.
const POLL_MS: u32 = 1;

pub struct UartController<H: UartHardware, D: DelayNs, const RX: usize = 64, const TX: usize = 64>
{
    pub hardware: H,
    delay: D,
    rx_ring: RingBuffer<RX>,
    tx_ring: RingBuffer<TX>,
    /// Error flags latched by the receive handler, consumed read-clear by
    /// [`Self::recv`]. Atomic swap avoids losing a handler update racing
    /// the mainline read.
    rx_error: AtomicU8,
    open: bool,
}

impl<H: UartHardware, D: DelayNs, const RX: usize, const TX: usize> UartController<H, D, RX, TX> {
    pub fn new(hardware: H, delay: D) -> Self {
        Self {
            hardware,
            delay,
            rx_ring: RingBuffer::new(),
            tx_ring: RingBuffer::new(),
            rx_error: AtomicU8::new(0),
            open: false,
        }
    }

    /// Program baud/format registers and enable the receiver, transmitter
    /// and receive interrupt. Idempotent: a second `open` without an
    /// intervening [`Self::close`] touches no hardware state.
    pub fn open(&mut self, config: &Config) {
        if self.open {
            return;
        }
        self.hardware.configure(config);
        self.hardware.set_rx_enabled(true);
        self.hardware.set_tx_enabled(true);
        self.hardware.set_rx_interrupt(true);
        self.hardware.set_tx_empty_interrupt(false);
        self.open = true;
    }

    /// Drain pending output, then disable the port. Unread received data
    /// is discarded. Safe to call on an unopened port.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.flush(Direction::Out);
        self.hardware.set_rx_interrupt(false);
        self.hardware.set_tx_empty_interrupt(false);
        self.hardware.set_rx_enabled(false);
        self.hardware.set_tx_enabled(false);
        self.rx_ring.clear();
        self.rx_error.store(0, Ordering::Relaxed);
        self.open = false;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Count of unread bytes in the receive ring. Never blocks.
    #[must_use]
    pub fn available(&self) -> usize {
        self.rx_ring.len()
    }

    /// Receive-complete interrupt entry point.
    ///
    /// Reads the latched hardware error flags, then stores the incoming
    /// byte if the ring has room. A full ring drops the byte and latches
    /// an overflow flag instead; adjacent slots are never corrupted.
    pub fn on_recv(&mut self) {
        let flags = self.hardware.rx_errors();
        // The data register must be read even when the byte is dropped,
        // or the receive-complete condition would re-raise forever.
        let byte = self.hardware.read_data();
        let flags = if self.rx_ring.push(byte) {
            flags
        } else {
            flags.union(ErrorFlags::OVERFLOW)
        };
        if !flags.is_empty() {
            self.rx_error.fetch_or(flags.bits(), Ordering::Relaxed);
        }
    }

    /// Transmit-data-register-empty interrupt entry point.
    ///
    /// Moves the next queued byte into the hardware data register. When
    /// the ring runs dry the transmit-empty interrupt is disabled so the
    /// peripheral stops signalling for data that does not exist.
    pub fn on_send(&mut self) {
        if let Some(byte) = self.tx_ring.pop() {
            self.hardware.write_data(byte);
        }
        if self.tx_ring.is_empty() {
            self.hardware.set_tx_empty_interrupt(false);
        }
    }

    /// Flush one or both queues.
    ///
    /// Outbound blocks until the transmit ring is drained and the
    /// hardware reports transmit-complete, pumping [`Self::on_send`]
    /// manually while global interrupts are disabled. Inbound discards
    /// buffered receive data.
    pub fn flush(&mut self, direction: Direction) {
        if matches!(direction, Direction::In | Direction::Both) {
            self.rx_ring.clear();
            self.rx_error.store(0, Ordering::Relaxed);
        }
        if matches!(direction, Direction::Out | Direction::Both) {
            while self.hardware.tx_empty_interrupt_enabled() || !self.hardware.transmit_complete()
            {
                if !self.hardware.interrupts_enabled()
                    && self.hardware.tx_empty_interrupt_enabled()
                    && self.hardware.data_register_empty()
                {
                    // Interrupts cannot fire here; drain the ring
                    // ourselves.
                    self.on_send();
                }
            }
        }
    }

    /// Queue one byte for transmission.
    ///
    /// Busy-waits for ring space, pumping the transmit handler manually
    /// while global interrupts are disabled. A zero `timeout` waits
    /// indefinitely. `drain` additionally waits for the byte to leave the
    /// wire.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when no space frees within `timeout`;
    /// [`Error::NotOpen`] on a closed port.
    pub fn send_byte(
        &mut self,
        byte: u8,
        drain: bool,
        timeout: MillisDurationU32,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let mut waited_ms = 0u32;
        while self.tx_ring.is_full() {
            if !self.hardware.interrupts_enabled() && self.hardware.data_register_empty() {
                self.on_send();
                continue;
            }
            if timeout.ticks() > 0 {
                self.delay.delay_ms(POLL_MS);
                waited_ms += POLL_MS;
                if waited_ms >= timeout.ticks() {
                    return Err(Error::Timeout);
                }
            }
        }
        // Space checked above and mainline is the ring's only producer.
        let _ = self.tx_ring.push(byte);
        self.hardware.set_tx_empty_interrupt(true);
        if drain {
            self.flush(Direction::Out);
        }
        Ok(())
    }

    /// Queue a buffer for transmission, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Self::send_byte`] failure.
    pub fn send(&mut self, buf: &[u8], drain: bool) -> Result<(), Error> {
        for &byte in buf {
            self.send_byte(byte, false, MillisDurationU32::millis(0))?;
        }
        if drain {
            self.flush(Direction::Out);
        }
        Ok(())
    }

    /// Queue a string for transmission.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Self::send_byte`] failure.
    pub fn send_str(&mut self, s: &str, drain: bool) -> Result<(), Error> {
        self.send(s.as_bytes(), drain)
    }

    /// Non-blocking pop from the receive ring.
    ///
    /// Returns the byte merged with the error flags latched since the
    /// previous consume, clearing the latch, or the no-data sentinel when
    /// the ring is empty.
    pub fn recv(&mut self) -> RecvStatus {
        match self.rx_ring.pop() {
            Some(byte) => {
                let flags = ErrorFlags::from_bits(self.rx_error.swap(0, Ordering::Relaxed));
                RecvStatus::new(byte, flags)
            }
            None => RecvStatus::no_data(),
        }
    }

    /// Fill `buf`, busy-waiting in [`POLL_MS`] steps while the ring is
    /// empty. Returns the union of all error flags observed, with
    /// [`ErrorFlags::TIMEOUT`] set when the bound expires first; a zero
    /// `timeout` fails immediately on an empty ring.
    ///
    /// Bytes already stored before a timeout are left in place. The
    /// return value does not say how many; callers cannot distinguish
    /// partial receipt from none by the flags alone.
    pub fn recv_into(&mut self, buf: &mut [u8], timeout: MillisDurationU32) -> ErrorFlags {
        let mut flags = ErrorFlags::empty();
        let mut waited_ms = 0u32;
        let mut slots = buf.iter_mut();
        let mut current = slots.next();
        while let Some(slot) = current.take() {
            let status = self.recv();
            if status.is_no_data() {
                if waited_ms >= timeout.ticks() {
                    return flags.union(ErrorFlags::TIMEOUT);
                }
                self.delay.delay_ms(POLL_MS);
                waited_ms += POLL_MS;
                current = Some(slot);
                continue;
            }
            flags = flags.union(status.errors());
            *slot = status.byte();
            current = slots.next();
        }
        flags
    }

    /// Non-blocking single-byte receive in `nb` form.
    ///
    /// # Errors
    ///
    /// [`nb::Error::WouldBlock`] when the ring is empty,
    /// [`Error::NotOpen`] on a closed port.
    pub fn try_recv(&mut self) -> nb::Result<(u8, ErrorFlags), Error> {
        if !self.open {
            return Err(nb::Error::Other(Error::NotOpen));
        }
        let status = self.recv();
        if status.is_no_data() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok((status.byte(), status.errors()))
        }
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.open {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }
}

impl<H: UartHardware, D: DelayNs, const RX: usize, const TX: usize> embedded_io::ErrorType
    for UartController<H, D, RX, TX>
{
    type Error = Error;
}

impl<H: UartHardware, D: DelayNs, const RX: usize, const TX: usize> embedded_io::Read
    for UartController<H, D, RX, TX>
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.ensure_open()?;
        let mut count = 0usize;
        let mut slots = buf.iter_mut();
        let mut current = slots.next();
        while let Some(slot) = current.take() {
            let status = self.recv();
            if status.is_no_data() {
                if count > 0 {
                    break;
                }
                // Contract requires at least one byte; wait for it.
                self.delay.delay_ms(POLL_MS);
                current = Some(slot);
                continue;
            }
            *slot = status.byte();
            count += 1;
            current = slots.next();
        }
        Ok(count)
    }
}

impl<H: UartHardware, D: DelayNs, const RX: usize, const TX: usize> embedded_io::ReadReady
    for UartController<H, D, RX, TX>
{
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.available() > 0)
    }
}

impl<H: UartHardware, D: DelayNs, const RX: usize, const TX: usize> embedded_io::Write
    for UartController<H, D, RX, TX>
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.send(buf, false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        UartController::flush(self, Direction::Out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, ReadReady, Write};

    #[derive(Default)]
    struct MockDelay;

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Simulated USART register block. `auto_drain` models a shifter that
    /// empties instantly; with it off, bytes sit in `thr` until the test
    /// clears them.
    #[derive(Default)]
    struct MockUart {
        configure_calls: usize,
        divisor: u16,
        rx_enabled: bool,
        tx_enabled: bool,
        rx_interrupt: bool,
        tx_empty_interrupt: bool,
        global_interrupts: bool,
        auto_drain: bool,
        thr: Option<u8>,
        wire: Vec<u8>,
        rx_data: u8,
        rx_flags: ErrorFlags,
    }

    impl UartHardware for MockUart {
        fn configure(&mut self, config: &Config) {
            self.configure_calls += 1;
            self.divisor = crate::uart::common::baud_divisor(
                config.clock,
                config.baud_rate,
                config.double_speed,
            );
        }

        fn set_rx_enabled(&mut self, enabled: bool) {
            self.rx_enabled = enabled;
        }

        fn set_tx_enabled(&mut self, enabled: bool) {
            self.tx_enabled = enabled;
        }

        fn set_rx_interrupt(&mut self, enabled: bool) {
            self.rx_interrupt = enabled;
        }

        fn set_tx_empty_interrupt(&mut self, enabled: bool) {
            self.tx_empty_interrupt = enabled;
        }

        fn tx_empty_interrupt_enabled(&self) -> bool {
            self.tx_empty_interrupt
        }

        fn read_data(&mut self) -> u8 {
            self.rx_data
        }

        fn write_data(&mut self, byte: u8) {
            if self.auto_drain {
                self.wire.push(byte);
            } else {
                self.thr = Some(byte);
            }
        }

        fn data_register_empty(&self) -> bool {
            self.thr.is_none()
        }

        fn transmit_complete(&self) -> bool {
            self.thr.is_none()
        }

        fn rx_errors(&self) -> ErrorFlags {
            self.rx_flags
        }

        fn interrupts_enabled(&self) -> bool {
            self.global_interrupts
        }
    }

    type SmallUart = UartController<MockUart, MockDelay, 4, 4>;

    fn open_uart() -> UartController<MockUart, MockDelay> {
        let hardware = MockUart {
            auto_drain: true,
            ..MockUart::default()
        };
        let mut uart = UartController::new(hardware, MockDelay::default());
        uart.open(&Config::default());
        uart
    }

    fn feed(uart: &mut UartController<MockUart, MockDelay>, byte: u8, flags: ErrorFlags) {
        uart.hardware.rx_data = byte;
        uart.hardware.rx_flags = flags;
        uart.on_recv();
    }

    #[test]
    fn open_configures_once_and_close_is_a_noop_when_closed() {
        let mut uart = open_uart();
        assert!(uart.is_open());
        assert!(uart.hardware.rx_enabled);
        assert!(uart.hardware.rx_interrupt);
        assert_eq!(uart.hardware.divisor, 8);

        uart.open(&Config::default());
        assert_eq!(uart.hardware.configure_calls, 1);

        uart.close();
        assert!(!uart.is_open());
        assert!(!uart.hardware.rx_enabled);
        uart.close();
        assert_eq!(uart.hardware.configure_calls, 1);
    }

    #[test]
    fn close_discards_unread_receive_data() {
        let mut uart = open_uart();
        feed(&mut uart, 0x11, ErrorFlags::empty());
        feed(&mut uart, 0x22, ErrorFlags::empty());
        assert_eq!(uart.available(), 2);
        uart.close();
        assert_eq!(uart.available(), 0);
        assert!(uart.recv().is_no_data());
    }

    #[test]
    fn echo_round_trip() {
        let mut uart = open_uart();

        uart.send_str("hello", true).unwrap();
        assert_eq!(uart.hardware.wire, b"hello");
        // Drained: ring empty, transmit-empty interrupt off again.
        assert!(!uart.hardware.tx_empty_interrupt_enabled());

        for &byte in b"hello" {
            feed(&mut uart, byte, ErrorFlags::empty());
        }
        let mut buf = [0u8; 5];
        let flags = uart.recv_into(&mut buf, MillisDurationU32::millis(200));
        assert!(flags.is_empty());
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn recv_merges_and_clears_latched_errors() {
        let mut uart = open_uart();
        feed(&mut uart, 0x55, ErrorFlags::FRAMING);
        feed(&mut uart, 0x66, ErrorFlags::empty());

        let first = uart.recv();
        assert_eq!(first.byte(), 0x55);
        assert!(first.errors().contains(ErrorFlags::FRAMING));

        // Latch was consumed by the first read.
        let second = uart.recv();
        assert_eq!(second.byte(), 0x66);
        assert!(second.errors().is_empty());

        assert!(uart.recv().is_no_data());
    }

    #[test]
    fn receive_overflow_sets_flag_and_keeps_ring_intact() {
        let hardware = MockUart {
            auto_drain: true,
            ..MockUart::default()
        };
        let mut uart = SmallUart::new(hardware, MockDelay::default());
        uart.open(&Config::default());

        for byte in 0..5u8 {
            uart.hardware.rx_data = byte;
            uart.on_recv();
        }
        // Capacity 3: bytes 3 and 4 were dropped, not stored.
        assert_eq!(uart.available(), 3);

        let first = uart.recv();
        assert_eq!(first.byte(), 0);
        assert!(first.errors().contains(ErrorFlags::OVERFLOW));
        assert_eq!(uart.recv().byte(), 1);
        assert_eq!(uart.recv().byte(), 2);
        assert!(uart.recv().is_no_data());
    }

    #[test]
    fn recv_into_zero_timeout_returns_immediately_untouched() {
        let mut uart = open_uart();
        let mut buf = [0xAAu8; 4];
        let flags = uart.recv_into(&mut buf, MillisDurationU32::millis(0));
        assert!(flags.contains(ErrorFlags::TIMEOUT));
        assert_eq!(buf, [0xAA; 4]);
    }

    #[test]
    fn recv_into_times_out_after_partial_receipt() {
        let mut uart = open_uart();
        feed(&mut uart, b'x', ErrorFlags::empty());

        let mut buf = [0u8; 3];
        let flags = uart.recv_into(&mut buf, MillisDurationU32::millis(20));
        assert!(flags.contains(ErrorFlags::TIMEOUT));
        // Partial data is left in place; the flags do not report the
        // count.
        assert_eq!(buf[0], b'x');
    }

    #[test]
    fn send_pumps_handler_when_interrupts_disabled() {
        let hardware = MockUart {
            auto_drain: true,
            global_interrupts: false,
            ..MockUart::default()
        };
        let mut uart = SmallUart::new(hardware, MockDelay::default());
        uart.open(&Config::default());

        // Five bytes through a 3-slot ring: progress requires the manual
        // pump, since no interrupt can ever fire.
        for byte in b"pumps" {
            uart.send_byte(*byte, false, MillisDurationU32::millis(50))
                .unwrap();
        }
        uart.flush(Direction::Out);
        assert_eq!(uart.hardware.wire, b"pumps");
    }

    #[test]
    fn send_times_out_when_ring_stays_full() {
        // Transmit shifter permanently occupied; the pump cannot run.
        let hardware = MockUart {
            auto_drain: false,
            thr: Some(0xEE),
            ..MockUart::default()
        };
        let mut uart = SmallUart::new(hardware, MockDelay::default());
        uart.open(&Config::default());

        for byte in 0..3u8 {
            uart.send_byte(byte, false, MillisDurationU32::millis(50))
                .unwrap();
        }
        assert_eq!(
            uart.send_byte(0xFF, false, MillisDurationU32::millis(50)),
            Err(Error::Timeout)
        );
    }

    #[test]
    fn operations_require_open() {
        let mut uart =
            UartController::<MockUart, MockDelay>::new(MockUart::default(), MockDelay::default());
        assert_eq!(
            uart.send_byte(0x00, false, MillisDurationU32::millis(1)),
            Err(Error::NotOpen)
        );
        assert_eq!(uart.try_recv(), Err(nb::Error::Other(Error::NotOpen)));
    }

    #[test]
    fn nb_receive() {
        let mut uart = open_uart();
        assert_eq!(uart.try_recv(), Err(nb::Error::WouldBlock));
        feed(&mut uart, 0x7E, ErrorFlags::empty());
        assert_eq!(uart.try_recv(), Ok((0x7E, ErrorFlags::empty())));
    }

    #[test]
    fn embedded_io_round_trip() {
        let mut uart = open_uart();
        assert_eq!(Write::write(&mut uart, b"io"), Ok(2));
        Write::flush(&mut uart).unwrap();
        assert_eq!(uart.hardware.wire, b"io");

        assert_eq!(ReadReady::read_ready(&mut uart), Ok(false));
        for &byte in b"back" {
            feed(&mut uart, byte, ErrorFlags::empty());
        }
        assert_eq!(ReadReady::read_ready(&mut uart), Ok(true));

        let mut buf = [0u8; 8];
        // Read returns what is buffered without waiting for more.
        assert_eq!(Read::read(&mut uart, &mut buf), Ok(4));
        assert_eq!(&buf[..4], b"back");
    }
}
