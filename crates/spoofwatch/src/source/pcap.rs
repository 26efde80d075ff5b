//! Offline packet captures (classic pcap format)
//!
//! Both byte orders and both subsecond resolutions are handled. Records are
//! filtered down to IPv4/UDP; the sender's IP is the device id and the
//! capture timestamp is delivered at millisecond resolution.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::DateTime;
use eyre::WrapErr;

use crate::detect::Handler;

const LINKTYPE_ETHERNET: u32 = 1;
const LINKTYPE_RAW_IP: u32 = 101;

pub struct PcapSource {
    path: PathBuf,
}

impl PcapSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn run<H: Handler>(&self, handler: &mut H) -> eyre::Result<()> {
        let data = std::fs::read(&self.path)
            .wrap_err_with(|| format!("Failed to read capture {:?}", self.path))?;
        replay(&data, handler).wrap_err_with(|| format!("Failed to parse capture {:?}", self.path))
    }
}

struct Format {
    big_endian: bool,
    nanosecond: bool,
}

/// Drive every UDP payload in the capture through the handler
pub fn replay<H: Handler>(data: &[u8], handler: &mut H) -> eyre::Result<()> {
    if data.len() < 24 {
        eyre::bail!("Capture shorter than a pcap global header");
    }
    let format = match LittleEndian::read_u32(&data[..4]) {
        0xa1b2_c3d4 => Format { big_endian: false, nanosecond: false },
        0xa1b2_3c4d => Format { big_endian: false, nanosecond: true },
        0xd4c3_b2a1 => Format { big_endian: true, nanosecond: false },
        0x4d3c_b2a1 => Format { big_endian: true, nanosecond: true },
        magic => eyre::bail!("Unknown pcap magic {magic:#010x}"),
    };
    let read_u32 = |bytes: &[u8]| {
        if format.big_endian {
            BigEndian::read_u32(bytes)
        } else {
            LittleEndian::read_u32(bytes)
        }
    };
    let link_type = read_u32(&data[20..24]);

    let mut offset = 24;
    while offset + 16 <= data.len() {
        let ts_sec = i64::from(read_u32(&data[offset..offset + 4]));
        let ts_frac = i64::from(read_u32(&data[offset + 4..offset + 8]));
        let incl_len = read_u32(&data[offset + 8..offset + 12]) as usize;
        offset += 16;
        if offset + incl_len > data.len() {
            // Truncated tail, common in live-written captures
            break;
        }
        let record = &data[offset..offset + incl_len];
        offset += incl_len;

        let nanos = if format.nanosecond { ts_frac } else { ts_frac * 1000 };
        let millis = nanos / 1_000_000;
        let Some(time) = DateTime::from_timestamp(ts_sec, (millis * 1_000_000) as u32) else {
            continue;
        };
        let Some((source_ip, payload)) = udp_payload(record, link_type) else {
            continue;
        };
        let device_id = source_ip.to_string();
        let payload = String::from_utf8_lossy(payload);
        for sentence in payload.split("\r\n") {
            if sentence.is_empty() {
                continue;
            }
            handler.handle(&device_id, time, sentence);
        }
    }
    Ok(())
}

/// Peel Ethernet/IPv4/UDP headers off one captured frame
fn udp_payload(frame: &[u8], link_type: u32) -> Option<(Ipv4Addr, &[u8])> {
    let ip_packet = match link_type {
        LINKTYPE_ETHERNET => {
            if frame.len() < 14 {
                return None;
            }
            let mut ethertype = u16::from_be_bytes([frame[12], frame[13]]);
            let mut header_end = 14;
            // 802.1Q tagged frames carry the real ethertype four bytes later
            if ethertype == 0x8100 {
                if frame.len() < 18 {
                    return None;
                }
                ethertype = u16::from_be_bytes([frame[16], frame[17]]);
                header_end = 18;
            }
            if ethertype != 0x0800 {
                return None;
            }
            &frame[header_end..]
        }
        LINKTYPE_RAW_IP => frame,
        _ => return None,
    };

    if ip_packet.len() < 20 || ip_packet[0] >> 4 != 4 {
        return None;
    }
    let header_len = usize::from(ip_packet[0] & 0x0f) * 4;
    if header_len < 20 || ip_packet.len() < header_len + 8 {
        return None;
    }
    if ip_packet[9] != 17 {
        return None;
    }
    let source_ip = Ipv4Addr::new(ip_packet[12], ip_packet[13], ip_packet[14], ip_packet[15]);

    let udp = &ip_packet[header_len..];
    let udp_len = usize::from(u16::from_be_bytes([udp[4], udp[5]]));
    let end = udp_len.min(udp.len());
    if end < 8 {
        return None;
    }
    Some((source_ip, &udp[8..end]))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::source::tests::Collector;

    fn ethernet_ipv4_udp(source: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 14];
        frame[12] = 0x08;

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        let total_len = (20 + 8 + payload.len()) as u16;
        ip[2..4].copy_from_slice(&total_len.to_be_bytes());
        ip[8] = 64;
        ip[9] = 17;
        ip[12..16].copy_from_slice(&source);
        ip[16..20].copy_from_slice(&[10, 0, 0, 255]);

        let mut udp = vec![0u8; 8];
        udp[0..2].copy_from_slice(&10110u16.to_be_bytes());
        udp[2..4].copy_from_slice(&10110u16.to_be_bytes());
        udp[4..6].copy_from_slice(&((8 + payload.len()) as u16).to_be_bytes());

        frame.extend_from_slice(&ip);
        frame.extend_from_slice(&udp);
        frame.extend_from_slice(payload);
        frame
    }

    fn pcap(records: &[(u32, u32, Vec<u8>)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&65535u32.to_le_bytes());
        data.extend_from_slice(&LINKTYPE_ETHERNET.to_le_bytes());
        for (seconds, micros, frame) in records {
            data.extend_from_slice(&seconds.to_le_bytes());
            data.extend_from_slice(&micros.to_le_bytes());
            data.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            data.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            data.extend_from_slice(frame);
        }
        data
    }

    #[test]
    fn test_replays_udp_sentences() {
        let seconds = Utc
            .with_ymd_and_hms(2018, 8, 18, 16, 48, 24)
            .unwrap()
            .timestamp() as u32;
        let frame = ethernet_ipv4_udp([10, 0, 0, 1], b"$GPVTG,1*XX\r\n$GPVTG,2*XX\r\n");
        let capture = pcap(&[(seconds, 123_456, frame)]);

        let mut collector = Collector::default();
        replay(&capture, &mut collector).unwrap();

        assert_eq!(collector.events.len(), 2);
        let (device_id, time, sentence) = &collector.events[0];
        assert_eq!(device_id, "10.0.0.1");
        assert_eq!(sentence, "$GPVTG,1*XX");
        // Capture timestamps are delivered at millisecond resolution
        let expected =
            Utc.with_ymd_and_hms(2018, 8, 18, 16, 48, 24).unwrap() + chrono::Duration::milliseconds(123);
        assert_eq!(*time, expected);
        assert_eq!(collector.events[1].2, "$GPVTG,2*XX");
    }

    #[test]
    fn test_non_udp_records_are_skipped() {
        let mut tcp_frame = ethernet_ipv4_udp([10, 0, 0, 1], b"$GPVTG,1*XX\r\n");
        tcp_frame[14 + 9] = 6;
        let mut arp_frame = ethernet_ipv4_udp([10, 0, 0, 1], b"$GPVTG,1*XX\r\n");
        arp_frame[12] = 0x08;
        arp_frame[13] = 0x06;
        let capture = pcap(&[(0, 0, tcp_frame), (1, 0, arp_frame)]);

        let mut collector = Collector::default();
        replay(&capture, &mut collector).unwrap();
        assert!(collector.events.is_empty());
    }

    #[test]
    fn test_rejects_non_pcap_input() {
        let mut collector = Collector::default();
        assert!(replay(b"definitely not a capture", &mut collector).is_err());
    }

    #[test]
    fn test_truncated_tail_is_tolerated() {
        let frame = ethernet_ipv4_udp([10, 0, 0, 1], b"$GPVTG,1*XX\r\n");
        let mut capture = pcap(&[(0, 0, frame)]);
        capture.truncate(capture.len() - 4);
        let mut collector = Collector::default();
        replay(&capture, &mut collector).unwrap();
        assert!(collector.events.is_empty());
    }
}
