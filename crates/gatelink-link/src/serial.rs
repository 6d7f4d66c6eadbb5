//! `serialport`-backed driver.

use crate::error::{LinkError, Result};
use crate::traits::{LinkReader, LinkWriter, SerialBackend};
use gatelink_core::{LinkConfig, Parity, StopBits};
use serialport::{DataBits, FlowControl};
use tracing::debug;

/// Driver for the host's serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SystemSerial {
    pub fn new() -> Self {
        Self
    }
}

fn data_bits(bits: u8) -> Result<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(gatelink_core::Error::InvalidConfig(format!(
            "data bits must be 5-8, got {other}"
        ))
        .into()),
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

fn stop_bits(stop_bits: StopBits) -> serialport::StopBits {
    match stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

impl SerialBackend for SystemSerial {
    fn open(&self, config: &LinkConfig) -> Result<(LinkReader, LinkWriter)> {
        config.validate()?;

        let port = &config.port_name;
        let reader = serialport::new(port, config.baud_rate)
            .data_bits(data_bits(config.data_bits)?)
            .parity(parity(config.parity))
            .stop_bits(stop_bits(config.stop_bits))
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| LinkError::open_failed(port, e.to_string()))?;

        // The clone carries its own timeout, so the writer can use a shorter
        // bound than the reader.
        let mut writer = reader
            .try_clone()
            .map_err(|e| LinkError::open_failed(port, e.to_string()))?;
        writer
            .set_timeout(config.write_timeout())
            .map_err(|e| LinkError::open_failed(port, e.to_string()))?;

        debug!(port = %port, baud = config.baud_rate, "Serial port opened");
        Ok((Box::new(reader), Box::new(writer)))
    }

    fn available_ports(&self) -> Result<Vec<String>> {
        let ports =
            serialport::available_ports().map_err(|e| LinkError::enumeration(e.to_string()))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}
