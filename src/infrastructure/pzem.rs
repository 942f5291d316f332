// PZEM-016 power meter over Modbus RTU
use crate::application::sensor_adapter::{SensorAdapter, TransportError};
use crate::domain::reading::PowerReading;
use crate::infrastructure::serial_link::{DevicePort, SerialLink};
use async_trait::async_trait;
use std::io::{Read, Write};

pub const DEFAULT_ADDRESS: u8 = 0x01;

const READ_INPUT_REGISTERS: u8 = 0x04;
const EXCEPTION_FLAG: u8 = 0x80;
const REGISTER_COUNT: u16 = 10;
const DATA_LEN: usize = REGISTER_COUNT as usize * 2;
const HEADER_LEN: usize = 3;
const RESPONSE_LEN: usize = HEADER_LEN + DATA_LEN + 2;
const EXCEPTION_LEN: usize = 5;
const ALARM_ON: u16 = 0xFFFF;

/// CRC-16/MODBUS (poly 0xA001 reflected, init 0xFFFF).
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF, |crc, byte| {
        (0..8).fold(crc ^ u16::from(*byte), |crc, _| {
            if crc & 1 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            }
        })
    })
}

fn request_frame(address: u8) -> [u8; 8] {
    let mut frame = [0u8; 8];
    frame[0] = address;
    frame[1] = READ_INPUT_REGISTERS;
    frame[2..4].copy_from_slice(&0u16.to_be_bytes());
    frame[4..6].copy_from_slice(&REGISTER_COUNT.to_be_bytes());
    let crc = crc16(&frame[..6]);
    frame[6..8].copy_from_slice(&crc.to_le_bytes());
    frame
}

fn verify_crc(frame: &[u8]) -> Result<(), TransportError> {
    let (body, trailer) = frame.split_at(frame.len() - 2);
    let expected = crc16(body);
    let actual = u16::from_le_bytes([trailer[0], trailer[1]]);
    if expected != actual {
        return Err(TransportError::Checksum { expected, actual });
    }
    Ok(())
}

fn decode_response(address: u8, frame: &[u8]) -> Result<PowerReading, TransportError> {
    if frame.len() != RESPONSE_LEN {
        return Err(TransportError::MalformedFrame(format!(
            "expected {} bytes, got {}",
            RESPONSE_LEN,
            frame.len()
        )));
    }
    verify_crc(frame)?;
    if frame[0] != address {
        return Err(TransportError::MalformedFrame(format!(
            "reply from address {:#04x}, expected {:#04x}",
            frame[0], address
        )));
    }

    let data = &frame[HEADER_LEN..HEADER_LEN + DATA_LEN];
    let register = |i: usize| u16::from_be_bytes([data[2 * i], data[2 * i + 1]]);
    // 32-bit quantities are sent low word first
    let wide = |i: usize| u32::from(register(i)) | (u32::from(register(i + 1)) << 16);

    Ok(PowerReading {
        voltage: f64::from(register(0)) / 10.0,
        current: f64::from(wide(1)) / 1000.0,
        power: f64::from(wide(3)) / 10.0,
        energy: f64::from(wide(5)),
        frequency: f64::from(register(7)) / 10.0,
        power_factor: f64::from(register(8)) / 100.0,
        alarm: register(9) == ALARM_ON,
    })
}

/// Read one full reply (or exception) from the port.
fn read_reply<T: Read>(port: &mut T, address: u8) -> Result<PowerReading, TransportError> {
    let mut frame = [0u8; RESPONSE_LEN];
    port.read_exact(&mut frame[..HEADER_LEN])?;

    let function = frame[1];
    if function == READ_INPUT_REGISTERS | EXCEPTION_FLAG {
        port.read_exact(&mut frame[HEADER_LEN..EXCEPTION_LEN])?;
        verify_crc(&frame[..EXCEPTION_LEN])?;
        return Err(TransportError::DeviceException(frame[2]));
    }
    if function != READ_INPUT_REGISTERS {
        return Err(TransportError::MalformedFrame(format!(
            "unexpected function code {:#04x}",
            function
        )));
    }
    if usize::from(frame[2]) != DATA_LEN {
        return Err(TransportError::MalformedFrame(format!(
            "unexpected byte count {}",
            frame[2]
        )));
    }

    port.read_exact(&mut frame[HEADER_LEN..])?;
    decode_response(address, &frame)
}

pub struct Pzem016<T> {
    link: SerialLink<T>,
    address: u8,
}

impl<T> Pzem016<T>
where
    T: DevicePort,
{
    pub fn new(port: T, address: u8) -> Self {
        Self {
            link: SerialLink::new(port),
            address,
        }
    }
}

#[async_trait]
impl<T> SensorAdapter for Pzem016<T>
where
    T: DevicePort,
{
    type Reading = PowerReading;

    async fn read(&mut self) -> Result<PowerReading, TransportError> {
        let address = self.address;
        self.link
            .exchange(move |port| {
                port.write_all(&request_frame(address))?;
                port.flush()?;
                read_reply(port, address)
            })
            .await
    }
}
