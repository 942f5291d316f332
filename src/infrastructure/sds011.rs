// SDS011 particulate sensor, driven in query mode
use crate::application::sensor_adapter::{SensorAdapter, TransportError};
use crate::domain::reading::ParticulateReading;
use crate::infrastructure::serial_link::{DevicePort, SerialLink};
use async_trait::async_trait;
use std::io::{Read, Write};

const HEAD: u8 = 0xAA;
const TAIL: u8 = 0xAB;
const COMMAND: u8 = 0xB4;
const DATA_REPLY: u8 = 0xC0;
const COMMAND_REPLY: u8 = 0xC5;

const CMD_REPORT_MODE: u8 = 0x02;
const CMD_QUERY: u8 = 0x04;
const CMD_SLEEP_WORK: u8 = 0x06;

const SET: u8 = 0x01;
const QUERY_MODE: u8 = 0x01;
const MODE_SLEEP: u8 = 0x00;
const MODE_WORK: u8 = 0x01;

const COMMAND_LEN: usize = 19;
const REPLY_LEN: usize = 10;
// Active-mode reports may be queued ahead of the reply we want.
const MAX_SKIPPED_FRAMES: usize = 8;
const MAX_SCANNED_BYTES: usize = REPLY_LEN * (MAX_SKIPPED_FRAMES + 1);

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

fn command_frame(command: u8, data: &[u8]) -> [u8; COMMAND_LEN] {
    let mut frame = [0u8; COMMAND_LEN];
    frame[0] = HEAD;
    frame[1] = COMMAND;
    frame[2] = command;
    frame[3..3 + data.len()].copy_from_slice(data);
    // broadcast device id
    frame[15] = 0xFF;
    frame[16] = 0xFF;
    frame[17] = checksum(&frame[2..17]);
    frame[18] = TAIL;
    frame
}

fn validate_reply(frame: &[u8; REPLY_LEN]) -> Result<(), TransportError> {
    if frame[0] != HEAD || frame[9] != TAIL {
        return Err(TransportError::MalformedFrame(
            "missing frame head or tail".to_string(),
        ));
    }
    let expected = checksum(&frame[2..8]);
    if expected != frame[8] {
        return Err(TransportError::Checksum {
            expected: u16::from(expected),
            actual: u16::from(frame[8]),
        });
    }
    Ok(())
}

fn decode_measurement(frame: &[u8; REPLY_LEN]) -> ParticulateReading {
    let tenths = |lo: usize| f64::from(u16::from_le_bytes([frame[lo], frame[lo + 1]]));
    ParticulateReading {
        pm25: tenths(2) / 10.0,
        pm10: tenths(4) / 10.0,
    }
}

/// Read frames until one of `kind` (and, for command replies, echoing `command`) arrives.
fn read_reply<T: Read>(
    port: &mut T,
    kind: u8,
    command: Option<u8>,
) -> Result<[u8; REPLY_LEN], TransportError> {
    let mut scanned = 0;
    let mut skipped = 0;
    loop {
        let mut frame = [0u8; REPLY_LEN];
        port.read_exact(&mut frame[..1])?;
        scanned += 1;
        if frame[0] != HEAD {
            if scanned > MAX_SCANNED_BYTES {
                return Err(TransportError::MalformedFrame(
                    "no frame header in device output".to_string(),
                ));
            }
            continue;
        }

        port.read_exact(&mut frame[1..])?;
        scanned += REPLY_LEN - 1;
        validate_reply(&frame)?;

        let matches = frame[1] == kind && command.is_none_or(|command| frame[2] == command);
        if matches {
            return Ok(frame);
        }

        skipped += 1;
        tracing::debug!(kind = frame[1], skipped, "skipping unrelated sds011 frame");
        if skipped >= MAX_SKIPPED_FRAMES {
            return Err(TransportError::MalformedFrame(format!(
                "no {:#04x} reply after {} frames",
                kind, skipped
            )));
        }
    }
}

pub struct Sds011<T> {
    link: SerialLink<T>,
    query_mode: bool,
}

impl<T> Sds011<T>
where
    T: DevicePort,
{
    pub fn new(port: T) -> Self {
        Self {
            link: SerialLink::new(port),
            query_mode: false,
        }
    }

    async fn command(&self, command: u8, data: Vec<u8>) -> Result<(), TransportError> {
        self.link
            .exchange(move |port| {
                port.write_all(&command_frame(command, &data))?;
                port.flush()?;
                read_reply(port, COMMAND_REPLY, Some(command)).map(|_| ())
            })
            .await
    }
}

#[async_trait]
impl<T> SensorAdapter for Sds011<T>
where
    T: DevicePort,
{
    type Reading = ParticulateReading;

    async fn read(&mut self) -> Result<ParticulateReading, TransportError> {
        self.link
            .exchange(|port| {
                port.write_all(&command_frame(CMD_QUERY, &[]))?;
                port.flush()?;
                read_reply(port, DATA_REPLY, None).map(|frame| decode_measurement(&frame))
            })
            .await
    }

    async fn wake(&mut self) -> Result<(), TransportError> {
        self.command(CMD_SLEEP_WORK, vec![SET, MODE_WORK]).await?;
        // the sensor powers up in active reporting mode
        if !self.query_mode {
            self.command(CMD_REPORT_MODE, vec![SET, QUERY_MODE]).await?;
            self.query_mode = true;
        }
        Ok(())
    }

    async fn sleep(&mut self) -> Result<(), TransportError> {
        self.command(CMD_SLEEP_WORK, vec![SET, MODE_SLEEP]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::serial_link::fake::LoopbackPort;

    // PM2.5 12.0, PM10 50.0
    const MEASUREMENT: [u8; 10] = [0xAA, 0xC0, 0x78, 0x00, 0xF4, 0x01, 0xA1, 0x60, 0x6E, 0xAB];
    // PM2.5 10.0, PM10 20.0
    const OTHER_MEASUREMENT: [u8; 10] = [0xAA, 0xC0, 0x64, 0x00, 0xC8, 0x00, 0xA1, 0x60, 0x2D, 0xAB];
    const WORK_REPLY: [u8; 10] = [0xAA, 0xC5, 0x06, 0x01, 0x01, 0x00, 0xA1, 0x60, 0x09, 0xAB];
    const SLEEP_REPLY: [u8; 10] = [0xAA, 0xC5, 0x06, 0x01, 0x00, 0x00, 0xA1, 0x60, 0x08, 0xAB];
    const QUERY_MODE_REPLY: [u8; 10] = [0xAA, 0xC5, 0x02, 0x01, 0x01, 0x00, 0xA1, 0x60, 0x05, 0xAB];

    #[test]
    fn test_query_command_frame() {
        assert_eq!(
            command_frame(CMD_QUERY, &[]),
            [
                0xAA, 0xB4, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0xFF, 0xFF, 0x02, 0xAB
            ]
        );
    }

    #[test]
    fn test_sleep_command_frame() {
        let frame = command_frame(CMD_SLEEP_WORK, &[SET, MODE_SLEEP]);
        assert_eq!(&frame[..5], &[0xAA, 0xB4, 0x06, 0x01, 0x00]);
        assert_eq!(&frame[15..], &[0xFF, 0xFF, 0x05, 0xAB]);
    }

    #[tokio::test]
    async fn test_read_decodes_tenths() {
        let mut sensor = Sds011::new(LoopbackPort::replying(&[&MEASUREMENT]));

        let reading = sensor.read().await.unwrap();

        assert_eq!(reading, ParticulateReading { pm25: 12.0, pm10: 50.0 });
    }

    #[tokio::test]
    async fn test_read_skips_noise_and_command_replies() {
        let noisy = [&[0x00u8, 0x13][..], &WORK_REPLY, &OTHER_MEASUREMENT].concat();
        let mut sensor = Sds011::new(LoopbackPort::replying(&[&noisy]));

        let reading = sensor.read().await.unwrap();

        assert_eq!(reading, ParticulateReading { pm25: 10.0, pm10: 20.0 });
    }

    #[tokio::test]
    async fn test_read_rejects_bad_checksum() {
        let mut corrupted = MEASUREMENT;
        corrupted[8] = 0x00;
        let mut sensor = Sds011::new(LoopbackPort::replying(&[&corrupted]));

        assert!(matches!(
            sensor.read().await,
            Err(TransportError::Checksum { expected: 0x6E, actual: 0x00 })
        ));
    }

    #[tokio::test]
    async fn test_wake_selects_query_mode_once() {
        let mut sensor = Sds011::new(LoopbackPort::replying(&[
            &WORK_REPLY,
            &QUERY_MODE_REPLY,
            &SLEEP_REPLY,
            &WORK_REPLY,
        ]));

        sensor.wake().await.unwrap();
        sensor.sleep().await.unwrap();
        sensor.wake().await.unwrap();

        let written = sensor.link.with_port(|port| port.written.clone());
        let commands: Vec<(u8, u8)> = written
            .chunks(COMMAND_LEN)
            .map(|frame| (frame[2], frame[4]))
            .collect();
        assert_eq!(
            commands,
            vec![
                (CMD_SLEEP_WORK, MODE_WORK),
                (CMD_REPORT_MODE, QUERY_MODE),
                (CMD_SLEEP_WORK, MODE_SLEEP),
                (CMD_SLEEP_WORK, MODE_WORK),
            ]
        );
    }

    #[tokio::test]
    async fn test_silent_sensor_times_out() {
        let mut sensor = Sds011::new(LoopbackPort::default());

        assert!(matches!(sensor.read().await, Err(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn test_stale_report_is_dropped_before_a_query() {
        let port = LoopbackPort::default()
            .then_late(&WORK_REPLY[..4], &[&WORK_REPLY[4..], &MEASUREMENT[..]].concat())
            .then_late(&OTHER_MEASUREMENT, &[]);
        let mut sensor = Sds011::new(port);

        assert!(matches!(sensor.wake().await, Err(TransportError::Timeout)));
        let reading = sensor.read().await.unwrap();

        assert_eq!(reading, ParticulateReading { pm25: 10.0, pm10: 20.0 });
    }
}
