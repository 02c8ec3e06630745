//! NXP LPC UART ISP client.
//!
//! Host side of the boot ROM's serial In-System-Programming dialogue:
//! auto-baud synchronization, clock negotiation, echo control, unlock,
//! identity queries and uuencoded RAM transfer.

use core::marker::PhantomData;

#[macro_use]
extern crate log;

#[macro_use(block)]
extern crate nb;

extern crate embedded_hal;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};

#[cfg(feature = "structopt")]
extern crate structopt;

#[cfg(feature = "linux")]
extern crate linux_embedded_hal;

pub mod codec;
pub mod protocol;
pub mod uuencode;

#[cfg(feature = "linux")]
pub mod linux;

use crate::protocol::{
    Command, ExecMode, ReturnCode, Uid, EOL, EXEC_MIN_ADDRESS, RAM_BEGIN, SYNC_PROBE, SYNC_TOKEN,
    UNLOCK_CODE,
};

pub use crate::protocol::STANDARD_BAUD_RATES;

pub trait SerialPort<E>: Write<u8, Error = E> + Read<u8, Error = E> {
    fn set_rts(&mut self, level: bool) -> Result<(), E>;
    fn set_dtr(&mut self, level: bool) -> Result<(), E>;
}

/// Session progress through the ISP bring-up sequence
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    Disconnected,
    Synchronizing,
    ClockNegotiated,
    Ready,
    Unlocked,
    /// Bring-up failed; the target's state is unknown
    Faulted,
}

#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum Error<E: core::fmt::Debug> {
    /// Failure reported by the underlying serial transport
    #[error("serial transport error: {0:?}")]
    Serial(E),

    /// No terminated reply line arrived within the configured timeout
    #[error("timed out waiting for a reply line")]
    ResponseTimeout,

    /// A handshake step received something other than its expected line
    #[error("handshake failed: expected {expected:?}, received {actual:?}")]
    Handshake { expected: String, actual: String },

    /// A command reply did not match the expected echo or status shape
    #[error("unexpected reply: expected {expected:?}, received {actual:?}")]
    UnexpectedReply { expected: String, actual: String },

    /// The target explicitly reported a failure status
    #[error("target reported {0}")]
    Status(ReturnCode),

    /// A transfer block was still rejected after the configured resends
    #[error("block checksum rejected after {attempts} attempts")]
    ChecksumMismatch { attempts: u32 },

    /// Caller-supplied argument rejected before any transport traffic
    #[error("invalid parameter: {0}")]
    Parameter(&'static str),
}

impl<E: core::fmt::Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Serial(e)
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "structopt", derive(structopt::StructOpt))]
pub struct Options {
    /// Do not pulse DTR/RTS to reset the device into its ISP handler
    #[cfg_attr(feature = "structopt", structopt(long))]
    pub no_reset: bool,

    /// Timeout to wait for a full reply line
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "500"))]
    pub response_timeout_ms: u32,

    /// Period to poll the serial port for reply bytes
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "1"))]
    pub poll_delay_ms: u32,

    /// Period to wait after reset before probing the ISP handler
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "100"))]
    pub init_delay_ms: u32,

    /// Resend attempts for a transfer block whose checksum is rejected
    #[cfg_attr(feature = "structopt", structopt(long, default_value = "3"))]
    pub max_checksum_retries: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            no_reset: false,
            response_timeout_ms: 500,
            poll_delay_ms: 1,
            init_delay_ms: 100,
            max_checksum_retries: 3,
        }
    }
}

/// Outcome of a completed RAM transfer
#[derive(Clone, PartialEq, Debug)]
pub struct RamWriteSummary {
    /// Source bytes delivered
    pub bytes: usize,
    /// Transfer blocks sent
    pub blocks: u32,
    /// Blocks that had to be retransmitted after a rejected checksum
    pub resends: u32,
    /// Count of zero-pad bytes in the final line's last uuencode group
    pub trailing_padding: usize,
}

/// A live ISP session over an exclusively owned serial port.
///
/// The protocol is strictly half-duplex: every command is a blocking
/// round trip on the calling thread, and the port is released when the
/// session is dropped or [`Session::free`] is called.
pub struct Session<P, D, E> {
    state: State,
    options: Options,
    port: P,
    delay: D,
    baud: usize,
    clock_khz: u32,
    echo: bool,
    _err: PhantomData<E>,
}

impl<P, D, E> Session<P, D, E>
where
    P: SerialPort<E>,
    D: DelayMs<u32>,
    E: core::fmt::Debug,
{
    /// Create a new session instance around an opened port
    pub fn new(port: P, delay: D, baud: usize, clock_khz: u32, options: Options) -> Self {
        Self {
            state: State::Disconnected,
            options,
            port,
            delay,
            baud,
            clock_khz,
            echo: true,
            _err: PhantomData,
        }
    }

    /// Fetch the session state
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the target currently echoes received command text
    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Release the underlying serial port
    pub fn free(self) -> P {
        self.port
    }

    /// Synchronize with the ISP handler and negotiate the clock rate.
    ///
    /// Runs the fixed probe/token/clock dialogue. Any mismatch or
    /// timeout during bring-up is fatal and leaves the session faulted.
    /// The handler echoes received characters once synchronized.
    pub fn sync(&mut self) -> Result<(), Error<E>> {
        if !self.options.no_reset {
            self.reset_into_isp()?;
        }

        self.state = State::Synchronizing;

        match self.sync_inner() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = State::Faulted;
                Err(e)
            }
        }
    }

    fn reset_into_isp(&mut self) -> Result<(), Error<E>> {
        debug!("Resetting device into ISP handler");

        self.port.set_dtr(true)?;
        self.port.set_rts(true)?;

        self.delay.delay_ms(100u32);

        self.port.set_dtr(false)?;
        self.port.set_rts(false)?;

        self.delay.delay_ms(self.options.init_delay_ms);

        Ok(())
    }

    fn sync_inner(&mut self) -> Result<(), Error<E>> {
        debug!(
            "Synchronizing at {} baud, {} kHz",
            self.baud, self.clock_khz
        );

        // Auto-baud probe, sent bare
        block!(self.port.write(SYNC_PROBE))?;

        self.expect_line(&codec::line(SYNC_TOKEN))?;
        self.write_all(&codec::line(SYNC_TOKEN))?;
        self.state = State::ClockNegotiated;

        self.expect_line(&codec::line(&format!("{}\rOK", SYNC_TOKEN)))?;

        let khz = self.clock_khz.to_string();
        self.write_all(&codec::line(&khz))?;

        self.expect_line(&codec::line(&format!("{}\rOK", khz)))?;

        self.state = State::Ready;
        self.echo = true;

        debug!("Synchronized");

        Ok(())
    }

    /// Unlock the flash write, erase and go commands
    pub fn unlock(&mut self) -> Result<(), Error<E>> {
        self.request_ok(Command::Unlock, &[UNLOCK_CODE])?;
        self.state = State::Unlocked;

        debug!("Privileged commands unlocked");

        Ok(())
    }

    /// Set the target's echo mode, a no-op if it already matches
    pub fn set_echo(&mut self, on: bool) -> Result<(), Error<E>> {
        if on == self.echo {
            return Ok(());
        }

        // The expected reply is computed against the mode in effect at
        // send time; the flag flips only after a verified reply.
        self.request_ok(Command::Echo, &[on as u32])?;
        self.echo = on;

        debug!("Echo mode {}", if on { "on" } else { "off" });

        Ok(())
    }

    /// Read the part identification number
    pub fn read_part_id(&mut self) -> Result<u32, Error<E>> {
        self.request_ok(Command::ReadPartId, &[])?;
        self.read_decimal_line()
    }

    /// Read the 128-bit unique device serial number.
    ///
    /// The four words are returned exactly in transmission order.
    pub fn read_uid(&mut self) -> Result<Uid, Error<E>> {
        self.request_ok(Command::ReadUid, &[])?;

        let mut words = [0u32; 4];
        for word in words.iter_mut() {
            *word = self.read_decimal_line()?;
        }

        Ok(Uid(words))
    }

    /// Transfer a binary image into target RAM.
    ///
    /// `address` must lie in the RAM window on a word boundary and the
    /// image length must be a word multiple; violations are rejected
    /// before any transport traffic. Blocks whose checksum the target
    /// rejects are retransmitted unchanged up to
    /// [`Options::max_checksum_retries`] times each.
    pub fn write_to_ram(&mut self, address: u32, data: &[u8]) -> Result<RamWriteSummary, Error<E>> {
        if address < RAM_BEGIN {
            return Err(Error::Parameter("address below the RAM window"));
        }
        if address % 4 != 0 {
            return Err(Error::Parameter("address not on a word boundary"));
        }
        if data.len() % 4 != 0 {
            return Err(Error::Parameter("byte count not a multiple of 4"));
        }

        self.request_ok(Command::WriteToRam, &[address, data.len() as u32])?;

        debug!("Writing {} bytes to 0x{:08x}", data.len(), address);

        let mut blocks = 0u32;
        let mut resends = 0u32;

        for block in data.chunks(uuencode::BLOCK_MAX_BYTES) {
            blocks += 1;
            let mut attempts = 0u32;

            loop {
                attempts += 1;

                for chunk in block.chunks(uuencode::LINE_MAX_BYTES) {
                    self.write_line(&uuencode::encode_line(chunk))?;
                }
                self.write_line(uuencode::checksum(block).to_string().as_bytes())?;

                let reply = self.read_line()?;
                if codec::strip_eol(&reply) == Some(b"OK") {
                    break;
                }

                if attempts > self.options.max_checksum_retries {
                    return Err(Error::ChecksumMismatch { attempts });
                }

                debug!("Block {} rejected, resending", blocks);
                resends += 1;
            }
        }

        let tail = data
            .chunks(uuencode::LINE_MAX_BYTES)
            .last()
            .map(|c| c.len())
            .unwrap_or(0);

        Ok(RamWriteSummary {
            bytes: data.len(),
            blocks,
            resends,
            trailing_padding: (3 - tail % 3) % 3,
        })
    }

    /// Start execution at an address, leaving the ISP handler.
    ///
    /// Successful execution diverts control away from the handler, so no
    /// reply is awaited and the session drops back to `Disconnected`;
    /// the target may no longer be addressable afterwards.
    pub fn exec(&mut self, address: u32, mode: ExecMode) -> Result<(), Error<E>> {
        if address < EXEC_MIN_ADDRESS {
            return Err(Error::Parameter("execution address below 0x200"));
        }
        if !mode.is_supported() {
            return Err(Error::Parameter("execution mode not supported by this part"));
        }

        let addr = address.to_string();
        self.write_all(&codec::frame_tokens(
            Command::Go.verb(),
            &[&addr, mode.token()],
        ))?;

        debug!("Execution started at 0x{:08x}", address);

        self.state = State::Disconnected;

        Ok(())
    }

    /// Erase a prepared sector range.
    ///
    /// Not implemented: frames as `E <start> <end>` once the reply
    /// semantics are confirmed against a target.
    pub fn erase(&mut self, _start_sector: u32, _end_sector: u32) -> Result<(), Error<E>> {
        unimplemented!()
    }

    /// Compare two memory ranges.
    ///
    /// Not implemented: frames as `M <addr1> <addr2> <count>`.
    pub fn compare(&mut self, _addr1: u32, _addr2: u32, _count: u32) -> Result<(), Error<E>> {
        unimplemented!()
    }

    /// Prepare a sector range for erase or flash write.
    ///
    /// Not implemented: frames as `P <start> <end>`.
    pub fn prepare_write(&mut self, _start_sector: u32, _end_sector: u32) -> Result<(), Error<E>> {
        unimplemented!()
    }

    /// Program prepared flash sectors from a RAM image.
    ///
    /// Not implemented: frames as `C <flash_addr> <ram_addr> <count>`.
    pub fn write_to_flash(
        &mut self,
        _flash_address: u32,
        _ram_address: u32,
        _count: u32,
    ) -> Result<(), Error<E>> {
        unimplemented!()
    }

    /// Check whether a sector range is blank.
    ///
    /// Not implemented: frames as `I <start> <end>`.
    pub fn check_blank(&mut self, _start_sector: u32, _end_sector: u32) -> Result<(), Error<E>> {
        unimplemented!()
    }

    /// Read the boot code version number.
    ///
    /// Not implemented: frames as `K`, two data lines expected.
    pub fn read_boot_code_version(&mut self) -> Result<(u32, u32), Error<E>> {
        unimplemented!()
    }

    /// Change the serial rate and stop-bit count of the ISP handler.
    ///
    /// Not implemented: frames as `B <baud> <stop_bits>`.
    pub fn set_baud_rate(&mut self, _baud: u32, _stop_bits: u32) -> Result<(), Error<E>> {
        unimplemented!()
    }

    /// Read data from RAM or flash.
    ///
    /// Not implemented: frames as `R <address> <count>`, uuencoded data
    /// lines expected in reply.
    pub fn read_memory(&mut self, _address: u32, _count: u32) -> Result<Vec<u8>, Error<E>> {
        unimplemented!()
    }

    /// Send a command frame and parse its status reply
    fn request(&mut self, command: Command, args: &[u32]) -> Result<ReturnCode, Error<E>> {
        let frame = codec::frame(command, args);
        self.write_all(&frame)?;
        self.read_status(&frame)
    }

    fn request_ok(&mut self, command: Command, args: &[u32]) -> Result<(), Error<E>> {
        match self.request(command, args)? {
            ReturnCode::Success => Ok(()),
            code => Err(Error::Status(code)),
        }
    }

    /// Read the echoed command line (when echo is on) and the status line
    fn read_status(&mut self, frame: &[u8]) -> Result<ReturnCode, Error<E>> {
        if self.echo {
            let echoed = self.read_line()?;
            if echoed != frame {
                return Err(Error::UnexpectedReply {
                    expected: codec::printable(frame),
                    actual: codec::printable(&echoed),
                });
            }
        }

        let reply = self.read_line()?;
        codec::parse_return_code(&reply).ok_or_else(|| Error::UnexpectedReply {
            expected: "decimal return code".to_string(),
            actual: codec::printable(&reply),
        })
    }

    fn read_decimal_line(&mut self) -> Result<u32, Error<E>> {
        let line = self.read_line()?;
        codec::parse_decimal(&line).ok_or_else(|| Error::UnexpectedReply {
            expected: "decimal data line".to_string(),
            actual: codec::printable(&line),
        })
    }

    /// Read one full line, faulting the session on a mismatch
    fn expect_line(&mut self, expected: &[u8]) -> Result<(), Error<E>> {
        let line = self.read_line()?;
        if line != expected {
            return Err(Error::Handshake {
                expected: codec::printable(expected),
                actual: codec::printable(&line),
            });
        }
        Ok(())
    }

    /// Accumulate bytes until the end-of-line marker or the timeout
    fn read_line(&mut self) -> Result<Vec<u8>, Error<E>> {
        let mut line = Vec::new();
        let mut t = 0;

        loop {
            match self.port.read() {
                Err(nb::Error::WouldBlock) => {
                    self.delay.delay_ms(self.options.poll_delay_ms);
                    t += self.options.poll_delay_ms;

                    if t > self.options.response_timeout_ms {
                        return Err(Error::ResponseTimeout);
                    }
                }
                Err(nb::Error::Other(e)) => return Err(e.into()),
                Ok(byte) => {
                    line.push(byte);
                    if line.ends_with(EOL) {
                        return Ok(line);
                    }
                }
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        for &byte in bytes {
            block!(self.port.write(byte))?;
        }
        Ok(())
    }

    /// Write a line body followed by the end-of-line marker
    fn write_line(&mut self, body: &[u8]) -> Result<(), Error<E>> {
        self.write_all(body)?;
        self.write_all(EOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    #[derive(Clone, PartialEq, Debug)]
    struct MockError;

    /// Scripted serial port: replies are queued up front, writes captured
    struct MockPort {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl MockPort {
        fn scripted(rx: &[u8]) -> Self {
            Self {
                rx: rx.iter().cloned().collect(),
                tx: Vec::new(),
            }
        }
    }

    impl Read<u8> for MockPort {
        type Error = MockError;

        fn read(&mut self) -> nb::Result<u8, MockError> {
            self.rx.pop_front().ok_or(nb::Error::WouldBlock)
        }
    }

    impl Write<u8> for MockPort {
        type Error = MockError;

        fn write(&mut self, byte: u8) -> nb::Result<(), MockError> {
            self.tx.push(byte);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), MockError> {
            Ok(())
        }
    }

    impl SerialPort<MockError> for MockPort {
        fn set_rts(&mut self, _level: bool) -> Result<(), MockError> {
            Ok(())
        }

        fn set_dtr(&mut self, _level: bool) -> Result<(), MockError> {
            Ok(())
        }
    }

    struct MockDelay;

    impl DelayMs<u32> for MockDelay {
        fn delay_ms(&mut self, _ms: u32) {}
    }

    fn session(rx: &[u8]) -> Session<MockPort, MockDelay, MockError> {
        let mut options = Options::default();
        options.no_reset = true;
        Session::new(MockPort::scripted(rx), MockDelay, 115200, 50000, options)
    }

    fn ready_session(rx: &[u8], echo: bool) -> Session<MockPort, MockDelay, MockError> {
        let mut s = session(rx);
        s.state = State::Ready;
        s.echo = echo;
        s
    }

    #[test]
    fn sync_runs_full_handshake() {
        let mut s = session(b"Synchronized\r\nSynchronized\rOK\r\n50000\rOK\r\n");

        s.sync().unwrap();

        assert_eq!(s.port.tx, b"?Synchronized\r\n50000\r\n".to_vec());
        assert_eq!(s.state, State::Ready);
        assert!(s.echo);
    }

    #[test]
    fn sync_aborts_on_clock_nak() {
        let mut s = session(b"Synchronized\r\nSynchronized\rFAIL\r\n");

        let err = s.sync().unwrap_err();

        assert_eq!(
            err,
            Error::Handshake {
                expected: "Synchronized\rOK\r\n".to_string(),
                actual: "Synchronized\rFAIL\r\n".to_string(),
            }
        );
        // No clock value goes out after the failed acknowledgment
        assert_eq!(s.port.tx, b"?Synchronized\r\n".to_vec());
        assert_eq!(s.state, State::Faulted);
    }

    #[test]
    fn sync_times_out_without_target() {
        let mut s = session(b"");

        assert_eq!(s.sync().unwrap_err(), Error::ResponseTimeout);
        assert_eq!(s.state, State::Faulted);
    }

    #[test]
    fn part_id_without_echo() {
        let mut s = ready_session(b"0\r\n16\r\n", false);

        assert_eq!(s.read_part_id().unwrap(), 16);
        assert_eq!(s.port.tx, b"J\r\n".to_vec());
    }

    #[test]
    fn part_id_with_echo() {
        let mut s = ready_session(b"J\r\n0\r\n16\r\n", true);

        assert_eq!(s.read_part_id().unwrap(), 16);
        assert_eq!(s.port.tx, b"J\r\n".to_vec());
    }

    #[test]
    fn part_id_surfaces_target_status() {
        let mut s = ready_session(b"11\r\n", false);

        assert_eq!(
            s.read_part_id().unwrap_err(),
            Error::Status(ReturnCode::CodeReadProtectionEnabled)
        );
    }

    #[test]
    fn command_timeout_leaves_state_unchanged() {
        let mut s = ready_session(b"", false);

        assert_eq!(s.read_part_id().unwrap_err(), Error::ResponseTimeout);
        assert_eq!(s.state, State::Ready);
    }

    #[test]
    fn uid_preserves_word_order() {
        let mut s = ready_session(b"0\r\n67305985\r\n4\r\n3\r\n2\r\n", false);

        let uid = s.read_uid().unwrap();

        assert_eq!(uid, Uid([67305985, 4, 3, 2]));
        assert_eq!(s.port.tx, b"N\r\n".to_vec());
    }

    #[test]
    fn echo_toggle_is_idempotent() {
        let mut s = ready_session(b"", true);

        s.set_echo(true).unwrap();

        assert!(s.port.tx.is_empty());
    }

    #[test]
    fn echo_off_expects_echoed_frame() {
        let mut s = ready_session(b"A 0\r\n0\r\n", true);

        s.set_echo(false).unwrap();

        assert_eq!(s.port.tx, b"A 0\r\n".to_vec());
        assert!(!s.echo);
    }

    #[test]
    fn echo_toggle_mismatch_keeps_flag() {
        let mut s = ready_session(b"A 1\r\n0\r\n", true);

        assert!(matches!(
            s.set_echo(false).unwrap_err(),
            Error::UnexpectedReply { .. }
        ));
        assert!(s.echo);
    }

    #[test]
    fn unlock_advances_state() {
        let mut s = ready_session(b"0\r\n", false);

        s.unlock().unwrap();

        assert_eq!(s.port.tx, b"U 23130\r\n".to_vec());
        assert_eq!(s.state, State::Unlocked);
    }

    #[test]
    fn unlock_rejection_keeps_state() {
        let mut s = ready_session(b"8\r\n", false);

        assert_eq!(
            s.unlock().unwrap_err(),
            Error::Status(ReturnCode::InvalidCode)
        );
        assert_eq!(s.state, State::Ready);
    }

    #[test]
    fn ram_write_rejects_low_address() {
        let mut s = ready_session(b"", false);

        assert!(matches!(
            s.write_to_ram(0x2000, &[0u8; 4]).unwrap_err(),
            Error::Parameter(_)
        ));
        assert!(s.port.tx.is_empty());
    }

    #[test]
    fn ram_write_rejects_unaligned_address() {
        let mut s = ready_session(b"", false);

        assert!(matches!(
            s.write_to_ram(RAM_BEGIN + 2, &[0u8; 4]).unwrap_err(),
            Error::Parameter(_)
        ));
        assert!(s.port.tx.is_empty());
    }

    #[test]
    fn ram_write_rejects_unaligned_length() {
        let mut s = ready_session(b"", false);

        assert!(matches!(
            s.write_to_ram(RAM_BEGIN + 0x200, &[0u8; 6]).unwrap_err(),
            Error::Parameter(_)
        ));
        assert!(s.port.tx.is_empty());
    }

    #[test]
    fn ram_write_sends_block_and_checksum() {
        let mut s = ready_session(b"0\r\nOK\r\n", false);

        let summary = s.write_to_ram(RAM_BEGIN + 0x200, b"ABCDEFGH").unwrap();

        let mut expected = b"W 268435968 8\r\n".to_vec();
        expected.extend_from_slice(&uuencode::encode_line(b"ABCDEFGH"));
        expected.extend_from_slice(b"\r\n548\r\n");

        assert_eq!(s.port.tx, expected);
        assert_eq!(
            summary,
            RamWriteSummary {
                bytes: 8,
                blocks: 1,
                resends: 0,
                trailing_padding: 1,
            }
        );
    }

    #[test]
    fn ram_write_resends_rejected_block_unchanged() {
        let data: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
        let mut s = ready_session(b"0\r\nOK\r\nRESEND\r\nOK\r\n", false);

        let summary = s.write_to_ram(RAM_BEGIN + 0x200, &data).unwrap();

        let mut block2 = Vec::new();
        for chunk in data[900..].chunks(uuencode::LINE_MAX_BYTES) {
            block2.extend_from_slice(&uuencode::encode_line(chunk));
            block2.extend_from_slice(b"\r\n");
        }
        block2.extend_from_slice(uuencode::checksum(&data[900..]).to_string().as_bytes());
        block2.extend_from_slice(b"\r\n");

        let mut expected = format!("W {} 1000\r\n", RAM_BEGIN + 0x200).into_bytes();
        for chunk in data[..900].chunks(uuencode::LINE_MAX_BYTES) {
            expected.extend_from_slice(&uuencode::encode_line(chunk));
            expected.extend_from_slice(b"\r\n");
        }
        expected.extend_from_slice(uuencode::checksum(&data[..900]).to_string().as_bytes());
        expected.extend_from_slice(b"\r\n");
        // the rejected second block goes out twice, byte for byte
        expected.extend_from_slice(&block2);
        expected.extend_from_slice(&block2);

        assert_eq!(s.port.tx, expected);
        assert_eq!(summary.blocks, 2);
        assert_eq!(summary.resends, 1);
    }

    #[test]
    fn ram_write_gives_up_after_retry_bound() {
        let mut s = ready_session(b"0\r\nRESEND\r\nRESEND\r\nRESEND\r\n", false);
        s.options.max_checksum_retries = 2;

        assert_eq!(
            s.write_to_ram(RAM_BEGIN, &[0u8; 4]).unwrap_err(),
            Error::ChecksumMismatch { attempts: 3 }
        );
    }

    #[test]
    fn exec_rejects_low_address() {
        let mut s = ready_session(b"", false);

        assert!(matches!(
            s.exec(0x100, ExecMode::Thumb).unwrap_err(),
            Error::Parameter(_)
        ));
        assert!(s.port.tx.is_empty());
    }

    #[test]
    fn exec_rejects_unsupported_mode() {
        let mut s = ready_session(b"", false);

        assert!(matches!(
            s.exec(0x1000, ExecMode::Arm).unwrap_err(),
            Error::Parameter(_)
        ));
        assert!(s.port.tx.is_empty());
    }

    #[test]
    fn exec_writes_frame_and_detaches() {
        let mut s = ready_session(b"", false);

        s.exec(0x1000, ExecMode::Thumb).unwrap();

        assert_eq!(s.port.tx, b"G 4096 T\r\n".to_vec());
        assert_eq!(s.state, State::Disconnected);
    }
}
