use std::io::Cursor;

use binrw::{binrw, BinReaderExt, BinWriterExt};

use crate::{
    array_ref,
    error::{Error, Result},
    format::entry::ErpEntry,
};

/// Supported container version.
pub const K_ERP_VERSION: u32 = 3;
/// Size of the fixed header block preceding the entry index.
pub const K_BASE_SIZE: u64 = 0x30;
/// Size of the full on-disk header, the index count fields included.
pub const K_HEADER_SIZE: usize = 0x38;
// Bytes of the index that aren't entry records: the entry and sub-record
// count fields.
const K_COUNTS_SIZE: u64 = 8;

/// Fixed archive header.
///
/// `index_size` counts everything from `K_BASE_SIZE` to the end of the
/// file; `file_size` is always exactly `K_BASE_SIZE` larger. Both are
/// recomputed from the live entry list on every write and never trusted on
/// read.
#[binrw]
#[brw(little, magic = b"ERPK")]
#[derive(Clone, Debug)]
pub struct ErpHeader {
    pub version: u32,
    pub reserved0: u64,
    pub base_size: u64,
    pub index_size: u64,
    pub file_size: u64,
    pub reserved1: u64,
    pub entry_count: u32,
    pub sub_record_total: u32,
}

/// A decoded archive: the ordered entry list.
///
/// The order is the on-disk order and is preserved on write; adding and
/// removing entries are the only operations that change it. All header
/// aggregates are computed from this list on demand.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErpFile {
    pub entries: Vec<ErpEntry>,
}

impl ErpFile {
    /// Decodes a whole archive. Any failure aborts the load; no partial
    /// archive is returned.
    pub fn read(data: &[u8]) -> Result<ErpFile> {
        let mut reader = Cursor::new(data);
        let header: ErpHeader = reader
            .read_le()
            .map_err(|_| Error::InvalidFormat("bad or truncated signature block".to_string()))?;
        if header.version != K_ERP_VERSION {
            return Err(Error::InvalidFormat(format!("unsupported version {}", header.version)));
        }
        if header.reserved0 != 0 || header.base_size != K_BASE_SIZE || header.reserved1 != 0 {
            return Err(Error::InvalidFormat("malformed signature block".to_string()));
        }
        log::debug!("header: {header:?}");

        // The stated entry count drives iteration, but every computed slice
        // is still bounds-checked against the buffer.
        let mut entries = Vec::new();
        let mut offset = K_HEADER_SIZE;
        for index in 0..header.entry_count {
            if data.len() < offset + 4 {
                return Err(Error::TruncatedEntry(format!(
                    "length prefix of entry {index} at {offset:#x} runs past the end of the file"
                )));
            }
            let total = u32::from_le_bytes(*array_ref!(data, offset, 4)) as usize + 4;
            let Some(record) = data.get(offset..offset + total) else {
                return Err(Error::TruncatedEntry(format!(
                    "entry {index} at {offset:#x} runs past the end of the file"
                )));
            };
            entries.push(ErpEntry::read(record)?);
            offset += total;
        }

        let file = ErpFile { entries };
        if header.sub_record_total != file.sub_record_total() {
            log::warn!(
                "header states {} sub-records, entries carry {}",
                header.sub_record_total,
                file.sub_record_total()
            );
        }
        if offset < data.len() {
            log::debug!("ignoring {} trailing bytes past the last entry", data.len() - offset);
        }
        Ok(file)
    }

    /// Re-encodes the whole archive into a single buffer, recomputing every
    /// header aggregate from the live entry list.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let index_size =
            K_COUNTS_SIZE + self.entries.iter().map(|e| e.encoded_len() as u64).sum::<u64>();
        let header = ErpHeader {
            version: K_ERP_VERSION,
            reserved0: 0,
            base_size: K_BASE_SIZE,
            index_size,
            file_size: index_size + K_BASE_SIZE,
            reserved1: 0,
            entry_count: self.entries.len() as u32,
            sub_record_total: self.sub_record_total(),
        };
        let mut writer = Cursor::new(Vec::with_capacity(header.file_size as usize));
        writer.write_le(&header)?;
        let mut out = writer.into_inner();
        for entry in &self.entries {
            out.extend_from_slice(&entry.to_bytes());
        }
        Ok(out)
    }

    /// Sum of every entry's sub-record count.
    pub fn sub_record_total(&self) -> u32 {
        self.entries.iter().map(|e| e.sub_records.len() as u32).sum()
    }

    /// Looks up an entry by display name.
    pub fn entry(&self, name: &str) -> Option<&ErpEntry> {
        self.entries.iter().find(|e| e.display_name() == name)
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<&mut ErpEntry> {
        self.entries.iter_mut().find(|e| e.display_name() == name)
    }

    /// Appends an entry. An existing entry with the same name bytes is
    /// rejected unless `overwrite` is set, in which case every match is
    /// dropped before the new entry lands at the end of the list.
    pub fn add_entry(&mut self, entry: ErpEntry, overwrite: bool) -> Result<()> {
        if self.entries.iter().any(|e| e.name == entry.name) {
            if !overwrite {
                return Err(Error::DuplicateName(entry.display_name().into_owned()));
            }
            self.entries.retain(|e| e.name != entry.name);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Removes and returns the first entry with the given display name.
    pub fn remove_entry(&mut self, name: &str) -> Result<ErpEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.display_name() == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(self.entries.remove(index))
    }

    /// Renames an entry in place, keeping its position in the list.
    pub fn rename_entry(&mut self, name: &str, new_name: &str, drop_extension: bool) -> Result<()> {
        let index = self
            .entries
            .iter()
            .position(|e| e.display_name() == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.entries[index] = self.entries[index].renamed(new_name, drop_extension)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{
        entry::{SubRecord, K_SUB_RECORD_SIZE, K_TYPE_GFX_SURFACE},
        TypeTag,
    };

    fn tag(text: &str) -> TypeTag {
        let mut tag = [0u8; 16];
        tag[..text.len()].copy_from_slice(text.as_bytes());
        TypeTag(tag)
    }

    fn entry(name: &str, kind: &str, sub_records: usize) -> ErpEntry {
        let mut stored = name.as_bytes().to_vec();
        stored.push(0);
        ErpEntry {
            name: stored,
            type_tag: tag(kind),
            reserved: [0; 4],
            sub_records: (0..sub_records)
                .map(|level| SubRecord([level as u8; K_SUB_RECORD_SIZE]))
                .collect(),
        }
    }

    fn surfaces() -> ErpFile {
        ErpFile {
            entries: vec![
                entry("textures/car.tga", K_TYPE_GFX_SURFACE, 3),
                entry("ui/flag.dds", K_TYPE_GFX_SURFACE, 2),
                entry("shaders/body.vp", "GfxProgram", 1),
            ],
        }
    }

    fn header_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(*array_ref!(data, offset, 4))
    }

    fn header_u64(data: &[u8], offset: usize) -> u64 {
        u64::from_le_bytes(*array_ref!(data, offset, 8))
    }

    #[test]
    fn empty_archive_is_header_only() {
        let data = ErpFile::default().to_bytes().unwrap();
        assert_eq!(data.len(), K_HEADER_SIZE);
        assert_eq!(&data[..4], b"ERPK");
        assert_eq!(header_u32(&data, 0x04), K_ERP_VERSION);
        assert_eq!(header_u64(&data, 0x10), K_BASE_SIZE);
        assert_eq!(header_u64(&data, 0x18), 8);
        assert_eq!(header_u64(&data, 0x20), K_HEADER_SIZE as u64);
        assert_eq!(header_u32(&data, 0x30), 0);
        assert_eq!(header_u32(&data, 0x34), 0);
    }

    #[test]
    fn size_fields_stay_in_sync() {
        let data = surfaces().to_bytes().unwrap();
        assert_eq!(header_u64(&data, 0x20), header_u64(&data, 0x18) + K_BASE_SIZE);
        assert_eq!(header_u64(&data, 0x20), data.len() as u64);
    }

    #[test]
    fn decode_reencode_is_byte_exact() {
        let data = surfaces().to_bytes().unwrap();
        let file = ErpFile::read(&data).unwrap();
        assert_eq!(file, surfaces());
        assert_eq!(file.to_bytes().unwrap(), data);
    }

    #[test]
    fn read_rejects_foreign_data() {
        assert!(matches!(ErpFile::read(b"not an archive"), Err(Error::InvalidFormat(_))));
        assert!(matches!(ErpFile::read(&[]), Err(Error::InvalidFormat(_))));

        let mut data = ErpFile::default().to_bytes().unwrap();
        data[0x04] = 2;
        assert!(matches!(ErpFile::read(&data), Err(Error::InvalidFormat(_))));

        let mut data = ErpFile::default().to_bytes().unwrap();
        data[0x0a] = 1;
        assert!(matches!(ErpFile::read(&data), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn read_rejects_truncated_entries() {
        let data = surfaces().to_bytes().unwrap();
        assert!(matches!(
            ErpFile::read(&data[..data.len() - 10]),
            Err(Error::TruncatedEntry(_))
        ));

        // A count pointing past the parseable entries fails on the missing
        // length prefix rather than reading out of bounds.
        let mut data = surfaces().to_bytes().unwrap();
        let count = header_u32(&data, 0x30) + 1;
        data[0x30..0x34].copy_from_slice(&count.to_le_bytes());
        assert!(matches!(ErpFile::read(&data), Err(Error::TruncatedEntry(_))));
    }

    #[test]
    fn aggregates_follow_mutations() {
        let mut file = surfaces();
        file.remove_entry("ui/flag.dds").unwrap();
        file.entry_mut("textures/car.tga").unwrap().remove_mip().unwrap();
        let data = file.to_bytes().unwrap();
        assert_eq!(header_u32(&data, 0x30), 2);
        assert_eq!(header_u32(&data, 0x34), 3);
        let reread = ErpFile::read(&data).unwrap();
        assert_eq!(reread.entries.len(), 2);
        assert_eq!(reread.sub_record_total(), 3);
    }

    #[test]
    fn duplicate_add_requires_authorization() {
        let mut file = surfaces();
        let duplicate = entry("ui/flag.dds", K_TYPE_GFX_SURFACE, 1);

        let err = file.add_entry(duplicate.clone(), false).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
        assert_eq!(file, surfaces());

        file.add_entry(duplicate.clone(), true).unwrap();
        assert_eq!(file.entries.len(), 3);
        let matches: Vec<_> =
            file.entries.iter().filter(|e| e.display_name() == "ui/flag.dds").collect();
        assert_eq!(matches.len(), 1);
        // The replacement lands at the end of the list.
        assert_eq!(file.entries.last().unwrap(), &duplicate);
    }

    #[test]
    fn remove_reports_missing_entries() {
        let mut file = surfaces();
        let removed = file.remove_entry("shaders/body.vp").unwrap();
        assert_eq!(removed.display_name(), "shaders/body.vp");
        assert!(matches!(
            file.remove_entry("shaders/body.vp"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(file.entries.len(), 2);
    }

    #[test]
    fn rename_preserves_position() {
        let mut file = surfaces();
        file.rename_entry("ui/flag.dds", "ui/banner", false).unwrap();
        assert_eq!(file.entries[1].display_name(), "ui/banner.dds");
        assert!(matches!(
            file.rename_entry("ui/flag.dds", "x", false),
            Err(Error::NotFound(_))
        ));
    }
}
