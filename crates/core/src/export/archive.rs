use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::ExportError;

pub const SUMMARY_MEMBER: &str = "XACTDOC.XML";
pub const DETAIL_MEMBER: &str = "GENERIC_ROUGHDRAFT.XML";

const MAX_COMPRESSION_LEVEL: i64 = 9;

/// Packs named documents into a deflated zip, in the given order.
pub fn write_archive(members: &[(&str, &str)]) -> Result<Vec<u8>, ExportError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(MAX_COMPRESSION_LEVEL));

    for (name, contents) in members {
        writer.start_file(*name, options).map_err(archive_error)?;
        writer.write_all(contents.as_bytes())?;
    }

    let cursor = writer.finish().map_err(archive_error)?;
    Ok(cursor.into_inner())
}

pub fn read_member(archive: &[u8], name: &str) -> Result<String, ExportError> {
    let mut archive = ZipArchive::new(Cursor::new(archive)).map_err(archive_error)?;
    let mut member = archive.by_name(name).map_err(archive_error)?;
    let mut contents = String::new();
    member.read_to_string(&mut contents)?;
    Ok(contents)
}

pub fn member_names(archive: &[u8]) -> Result<Vec<String>, ExportError> {
    let archive = ZipArchive::new(Cursor::new(archive)).map_err(archive_error)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

fn archive_error(error: zip::result::ZipError) -> ExportError {
    ExportError::Archive(error.to_string())
}

/// Identity of one detail line as the downstream tool sees it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DetailItem {
    pub code: String,
    pub quantity: Decimal,
    pub unit: String,
    pub rcv_total: Decimal,
}

/// Reads the detail document of an archive back into per-room item lists.
pub fn read_detail_items(archive: &[u8]) -> Result<BTreeMap<String, Vec<DetailItem>>, ExportError> {
    let document = read_member(archive, DETAIL_MEMBER)?;
    parse_detail_document(&document)
}

/// Collects the `ITEM` tags of every `GROUP type="room"` in a detail
/// document, keyed by room name.
///
/// A second room group carrying the same name under a different `roomId`
/// is keyed `"{name} ({roomId})"` so its lines stay separate.
pub fn parse_detail_document(
    document: &str,
) -> Result<BTreeMap<String, Vec<DetailItem>>, ExportError> {
    let mut reader = Reader::from_str(document);
    let mut rooms: BTreeMap<String, Vec<DetailItem>> = BTreeMap::new();
    let mut owners: BTreeMap<String, Option<String>> = BTreeMap::new();
    // one entry per open GROUP, holding the room key for room groups
    let mut open_groups: Vec<Option<String>> = Vec::new();

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(tag)) if tag.name().as_ref() == b"GROUP" => {
                let key = room_group_key(&tag, position, &mut owners)?;
                if let Some(key) = &key {
                    rooms.entry(key.clone()).or_default();
                }
                open_groups.push(key);
            }
            Ok(Event::Empty(tag)) if tag.name().as_ref() == b"GROUP" => {
                if let Some(key) = room_group_key(&tag, position, &mut owners)? {
                    rooms.entry(key).or_default();
                }
            }
            Ok(Event::End(tag)) if tag.name().as_ref() == b"GROUP" => {
                open_groups.pop();
            }
            Ok(Event::Start(tag) | Event::Empty(tag)) if tag.name().as_ref() == b"ITEM" => {
                let Some(room) = open_groups.last().and_then(Option::as_ref) else {
                    return Err(malformed(position, "ITEM outside of a room group"));
                };
                let item = detail_item(&tag, position)?;
                rooms.entry(room.clone()).or_default().push(item);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => return Err(malformed(reader.error_position(), &error.to_string())),
        }
    }

    Ok(rooms)
}

fn room_group_key(
    tag: &BytesStart<'_>,
    position: u64,
    owners: &mut BTreeMap<String, Option<String>>,
) -> Result<Option<String>, ExportError> {
    let attributes = attributes(tag, position)?;
    if attributes.get("type").map(String::as_str) != Some("room") {
        return Ok(None);
    }

    let name = attributes.get("name").cloned().unwrap_or_default();
    let room_id = attributes.get("roomId").cloned();
    let key = match (owners.get(&name), room_id.as_deref()) {
        (Some(owner), Some(id)) if owner.as_deref() != Some(id) => format!("{name} ({id})"),
        _ => name,
    };
    owners.entry(key.clone()).or_insert(room_id);
    Ok(Some(key))
}

fn detail_item(tag: &BytesStart<'_>, position: u64) -> Result<DetailItem, ExportError> {
    let attributes = attributes(tag, position)?;
    let decimal = |key: &str| -> Result<Decimal, ExportError> {
        attributes
            .get(key)
            .ok_or_else(|| malformed(position, &format!("missing `{key}` attribute")))?
            .parse::<Decimal>()
            .map_err(|error| malformed(position, &format!("bad `{key}`: {error}")))
    };

    Ok(DetailItem {
        code: attributes.get("code").cloned().unwrap_or_default(),
        quantity: decimal("qty")?,
        unit: attributes.get("unit").cloned().unwrap_or_default(),
        rcv_total: decimal("rcvTotal")?,
    })
}

fn attributes(
    tag: &BytesStart<'_>,
    position: u64,
) -> Result<BTreeMap<String, String>, ExportError> {
    let mut values = BTreeMap::new();
    for attribute in tag.attributes() {
        let attribute = attribute.map_err(|error| malformed(position, &error.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|error| malformed(position, &error.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        values.insert(key, value.into_owned());
    }
    Ok(values)
}

fn malformed(position: u64, detail: &str) -> ExportError {
    ExportError::Archive(format!("malformed detail document at byte {position}: {detail}"))
}
