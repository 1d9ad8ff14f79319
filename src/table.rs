//! Terminal rendering of records and serial ports.

use ep2000_lib::client::{CHECKSUM_FAILED, Reply, SenseReport};
use ep2000_lib::decoder::{Field, Record};
use ep2000_lib::serial::PortInfo;
use tabled::builder::Builder;
use tabled::settings::Style;

const RECORD_HEADER: [&str; 5] = ["Key", "Index", "Raw", "Value", "Unit"];
const SENSE_HEADER: [&str; 2] = ["Name", "Value"];

/// Fields of `record`, restricted to the names in `filter` when given.
pub fn selected_fields<'a>(
    record: &'a Record,
    filter: Option<&'a [&'a str]>,
) -> impl Iterator<Item = &'a Field> + 'a {
    record.iter().filter(move |field| {
        filter.map_or(true, |names| names.contains(&field.name.as_ref()))
    })
}

fn psql(builder: Builder) -> String {
    let mut table = builder.build();
    table.with(Style::psql());
    table.to_string()
}

fn checksum_failed_table() -> String {
    let mut builder = Builder::default();
    builder.push_record(SENSE_HEADER.map(String::from));
    builder.push_record(["error".to_string(), CHECKSUM_FAILED.to_string()]);
    psql(builder)
}

pub fn record_table(reply: &Reply<Record>, filter: Option<&[&str]>) -> String {
    let Reply::Valid(record) = reply else {
        return checksum_failed_table();
    };
    let mut builder = Builder::default();
    builder.push_record(RECORD_HEADER.map(String::from));
    for field in selected_fields(record, filter) {
        builder.push_record([
            field.name.to_string(),
            field.index.to_string(),
            field.raw.to_string(),
            field.value.to_string(),
            field.unit.to_string(),
        ]);
    }
    psql(builder)
}

pub fn sense_table(reply: &Reply<SenseReport>) -> String {
    let Reply::Valid(report) = reply else {
        return checksum_failed_table();
    };
    let mut builder = Builder::default();
    builder.push_record(SENSE_HEADER.map(String::from));
    builder.push_record(["detected".to_string(), report.detected.to_string()]);
    builder.push_record(["model".to_string(), report.meta.model.to_string()]);
    builder.push_record(["hex-string".to_string(), report.meta.hex.clone()]);
    psql(builder)
}

/// One block of padded `name: value` lines per port, separated by dashes.
pub fn ports_listing(ports: &[PortInfo]) -> String {
    let separator = "-".repeat(40);
    let mut out = String::new();
    for port in ports {
        out.push_str(&separator);
        out.push('\n');
        for (name, value) in port.attributes() {
            out.push_str(&format!("{:18}: {value}\n", name));
        }
    }
    if !ports.is_empty() {
        out.push_str(&separator);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ep2000_lib::decoder::decode;
    use ep2000_lib::profile;

    fn status_record() -> Record {
        let words: [u16; 27] = [
            1, 100, 4, 24, 2000, 2301, 500, 2299, 500, 12, 250, 280, 12, 0, 268, 68, 7, 95, 41, 0,
            0, 0, 1, 0, 1, 1, 0,
        ];
        let payload: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
        decode(&payload, &profile::STATUS, profile::MODEL).unwrap()
    }

    #[test]
    fn basic_filter() {
        let record = status_record();
        let names: Vec<_> = selected_fields(&record, Some(&profile::BASIC_STATUS_FIELDS[..]))
            .map(|field| field.name.to_string())
            .collect();
        assert_eq!(names.len(), profile::BASIC_STATUS_FIELDS.len());
        assert!(names.iter().all(|name| profile::BASIC_STATUS_FIELDS.contains(&name.as_str())));
        assert_eq!(selected_fields(&record, None).count(), 27);
    }

    #[test]
    fn record_table_rows() {
        let table = record_table(&Reply::Valid(status_record()), None);
        let header = table.lines().next().unwrap();
        for column in RECORD_HEADER {
            assert!(header.contains(column));
        }
        assert!(table.contains("WorkState"));
        assert!(table.contains("LINE"));
        assert!(table.contains("230.1"));
        // header and separator line
        assert_eq!(table.lines().count(), 27 + 2);
    }

    #[test]
    fn checksum_failure_table() {
        let table = record_table(&Reply::ChecksumFailed, None);
        assert!(table.contains("error"));
        assert!(table.contains("CRC failed"));
        assert!(sense_table(&Reply::ChecksumFailed).contains("CRC failed"));
    }

    #[test]
    fn port_listing_layout() {
        let ports = [PortInfo {
            device: "/dev/ttyUSB0".to_string(),
            kind: "USB",
            manufacturer: None,
            product: Some("FT232R".to_string()),
            serial_number: None,
            vid: None,
            pid: None,
        }];
        let listing = ports_listing(&ports);
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "-".repeat(40));
        assert_eq!(lines[1], "device            : /dev/ttyUSB0");
        assert_eq!(lines[3], "product           : FT232R");
        assert_eq!(lines.last().copied(), Some("-".repeat(40).as_str()));
        assert!(ports_listing(&[]).is_empty());
    }
}
