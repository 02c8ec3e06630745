//! Wire-level constants and enumerations for the LPC ISP dialogue.

use core::fmt;
use core::str::FromStr;

/// Line terminator used by both sides of the dialogue
pub const EOL: &[u8] = b"\r\n";

/// Auto-baud probe byte, sent bare with no terminator
pub const SYNC_PROBE: u8 = b'?';

/// Token exchanged during the synchronization handshake
pub const SYNC_TOKEN: &str = "Synchronized";

/// Code accepted by the `U` command to unlock write, erase and go
pub const UNLOCK_CODE: u32 = 23130;

/// Base of the on-chip SRAM window writable over ISP
pub const RAM_BEGIN: u32 = 0x1000_0000;

/// Lowest address the `G` command may jump to
pub const EXEC_MIN_ADDRESS: u32 = 0x200;

/// Baud rates the ISP handler accepts
pub const STANDARD_BAUD_RATES: [usize; 5] = [9600, 19200, 38400, 57600, 115200];

/// ISP command verbs.
///
/// Each command is a single-letter verb followed by decimal arguments,
/// terminated by [`EOL`].
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Command {
    /// Unlocks the flash write, erase and go commands
    Unlock,

    /// Changes the serial rate and stop-bit count of the ISP handler
    SetBaudRate,

    /// Turns echo of received characters on or off
    Echo,

    /// Downloads uuencoded data into RAM, blocked when code read protection is on
    WriteToRam,

    /// Reads data from RAM or flash, blocked when code read protection is on
    ReadMemory,

    /// Prepares a sector range for erase or flash write
    PrepareWrite,

    /// Programs prepared flash sectors from a RAM image
    CopyRamToFlash,

    /// Jumps to code at an address, leaving the ISP handler
    Go,

    /// Erases a prepared sector range
    Erase,

    /// Checks whether a sector range is blank
    CheckBlank,

    /// Reads the part identification number
    ReadPartId,

    /// Reads the boot code version number
    ReadBootCodeVersion,

    /// Compares two memory ranges
    Compare,

    /// Reads the 128-bit unique device serial number
    ReadUid,
}

impl Command {
    /// Verb token placed at the start of the command line
    pub fn verb(self) -> &'static str {
        match self {
            Command::Unlock => "U",
            Command::SetBaudRate => "B",
            Command::Echo => "A",
            Command::WriteToRam => "W",
            Command::ReadMemory => "R",
            Command::PrepareWrite => "P",
            Command::CopyRamToFlash => "C",
            Command::Go => "G",
            Command::Erase => "E",
            Command::CheckBlank => "I",
            Command::ReadPartId => "J",
            Command::ReadBootCodeVersion => "K",
            Command::Compare => "M",
            Command::ReadUid => "N",
        }
    }
}

/// Status values the target reports after most commands
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReturnCode {
    Success,
    InvalidCommand,
    InvalidChecksum,
    InvalidFrameLength,
    InvalidIdleFrame,
    InvalidParameter,
    AddressNotMapped,
    CommandLocked,
    InvalidCode,
    InvalidBaudRate,
    InvalidStopBit,
    CodeReadProtectionEnabled,
    /// Value outside the documented table, treated as a failure
    UnknownCode(u32),
}

impl ReturnCode {
    /// Map a decimal status value onto the documented table
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ReturnCode::Success,
            1 => ReturnCode::InvalidCommand,
            2 => ReturnCode::InvalidChecksum,
            3 => ReturnCode::InvalidFrameLength,
            4 => ReturnCode::InvalidIdleFrame,
            5 => ReturnCode::InvalidParameter,
            6 => ReturnCode::AddressNotMapped,
            7 => ReturnCode::CommandLocked,
            8 => ReturnCode::InvalidCode,
            9 => ReturnCode::InvalidBaudRate,
            10 => ReturnCode::InvalidStopBit,
            11 => ReturnCode::CodeReadProtectionEnabled,
            n => ReturnCode::UnknownCode(n),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ReturnCode::Success => 0,
            ReturnCode::InvalidCommand => 1,
            ReturnCode::InvalidChecksum => 2,
            ReturnCode::InvalidFrameLength => 3,
            ReturnCode::InvalidIdleFrame => 4,
            ReturnCode::InvalidParameter => 5,
            ReturnCode::AddressNotMapped => 6,
            ReturnCode::CommandLocked => 7,
            ReturnCode::InvalidCode => 8,
            ReturnCode::InvalidBaudRate => 9,
            ReturnCode::InvalidStopBit => 10,
            ReturnCode::CodeReadProtectionEnabled => 11,
            ReturnCode::UnknownCode(n) => n,
        }
    }

    pub fn is_success(self) -> bool {
        self == ReturnCode::Success
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let desc = match self {
            ReturnCode::Success => "success",
            ReturnCode::InvalidCommand => "invalid command",
            ReturnCode::InvalidChecksum => "invalid checksum",
            ReturnCode::InvalidFrameLength => "invalid frame length",
            ReturnCode::InvalidIdleFrame => "invalid idle frame",
            ReturnCode::InvalidParameter => "invalid parameter",
            ReturnCode::AddressNotMapped => "address not mapped",
            ReturnCode::CommandLocked => "command locked",
            ReturnCode::InvalidCode => "invalid code",
            ReturnCode::InvalidBaudRate => "invalid baud rate",
            ReturnCode::InvalidStopBit => "invalid stop bit",
            ReturnCode::CodeReadProtectionEnabled => "code read protection enabled",
            ReturnCode::UnknownCode(_) => "unknown return code",
        };
        write!(f, "{} ({})", desc, self.code())
    }
}

/// Processor state the `G` command starts execution in.
///
/// The LPC111x parts are Cortex-M0 and only run thumb code.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ExecMode {
    Arm,
    Thumb,
}

impl ExecMode {
    /// Mode letter sent on the wire
    pub fn token(self) -> &'static str {
        match self {
            ExecMode::Arm => "A",
            ExecMode::Thumb => "T",
        }
    }

    /// Whether the target family can execute in this mode
    pub fn is_supported(self) -> bool {
        matches!(self, ExecMode::Thumb)
    }
}

impl FromStr for ExecMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arm" => Ok(ExecMode::Arm),
            "thumb" => Ok(ExecMode::Thumb),
            _ => Err(format!("unknown execution mode: {}", s)),
        }
    }
}

/// 128-bit unique device serial number, four words in transmission order
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Uid(pub [u32; 4]);

impl Uid {
    pub fn words(&self) -> &[u32; 4] {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:08X}{:08X}{:08X}{:08X}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_codes_round_trip() {
        for code in 0..=11 {
            assert_eq!(ReturnCode::from_code(code).code(), code);
        }
    }

    #[test]
    fn out_of_table_codes_are_unknown() {
        assert_eq!(ReturnCode::from_code(19), ReturnCode::UnknownCode(19));
        assert!(!ReturnCode::from_code(19).is_success());
    }

    #[test]
    fn exec_mode_parses_case_insensitive() {
        assert_eq!("thumb".parse(), Ok(ExecMode::Thumb));
        assert_eq!("Arm".parse(), Ok(ExecMode::Arm));
        assert!("mips".parse::<ExecMode>().is_err());
    }

    #[test]
    fn uid_displays_words_in_transmission_order() {
        let uid = Uid([0x0001_0203, 0x0405_0607, 0x0809_0A0B, 0x0C0D_0E0F]);
        assert_eq!(uid.to_string(), "000102030405060708090A0B0C0D0E0F");
    }
}
