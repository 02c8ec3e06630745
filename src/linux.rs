use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

use anyhow::Context;
use linux_embedded_hal::{Delay, Serial};
use serial_core::{
    BaudRate, CharSize, FlowControl, Parity, SerialDevice as _, SerialPortSettings as _, StopBits,
};

use crate::protocol::STANDARD_BAUD_RATES;
use crate::{Options, SerialPort, Session};

impl SerialPort<std::io::ErrorKind> for Serial {
    fn set_rts(&mut self, level: bool) -> Result<(), std::io::ErrorKind> {
        self.0
            .set_rts(level)
            .map_err(|e| std::io::Error::from(e).kind())
    }
    fn set_dtr(&mut self, level: bool) -> Result<(), std::io::ErrorKind> {
        self.0
            .set_dtr(level)
            .map_err(|e| std::io::Error::from(e).kind())
    }
}

impl Session<Serial, Delay, IoErrorKind> {
    /// Create a new linux serial port session instance.
    ///
    /// The ISP handler speaks 8 data bits, no parity, one stop bit at
    /// one of the standard rates.
    pub fn linux<P: AsRef<Path>>(
        port: P,
        baud: usize,
        clock_khz: u32,
        options: Options,
    ) -> anyhow::Result<Self> {
        if !STANDARD_BAUD_RATES.contains(&baud) {
            anyhow::bail!("baud rate {} is not accepted by the ISP handler", baud);
        }

        // Open port
        let mut port = Serial::open(port.as_ref()).context("opening serial port")?;

        // Apply settings
        let mut settings = port.0.read_settings().context("reading port settings")?;

        settings.set_char_size(CharSize::Bits8);
        settings.set_stop_bits(StopBits::Stop1);
        settings
            .set_baud_rate(BaudRate::from_speed(baud))
            .context("applying baud rate")?;
        settings.set_flow_control(FlowControl::FlowNone);
        settings.set_parity(Parity::ParityNone);

        port.0
            .write_settings(&settings)
            .context("writing port settings")?;

        // Return instance
        Ok(Self::new(port, Delay {}, baud, clock_khz, options))
    }
}
