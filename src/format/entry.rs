use std::borrow::Cow;

use crate::{
    array_ref,
    error::{Error, Result},
    format::TypeTag,
};

/// Type tag of surface resources, whose sub-records are mip levels.
pub const K_TYPE_GFX_SURFACE: &str = "GfxSurfaceRes";

/// Size of one sub-record.
pub const K_SUB_RECORD_SIZE: usize = 0x21;

/// Number of mip sub-records a surface carries while its highest level is
/// still present.
pub const K_FULL_MIP_SET: usize = 3;

// Entry record layout: lengthPrefix(4) + nameLen(2) + name + typeTag(16) +
// reserved(4) + subRecordCount(1) + subRecords(count * 0x21). The length
// prefix counts every byte after itself.
const K_NAME_OFFSET: usize = 6;
const K_TYPE_TAG_SIZE: usize = 0x10;
const K_RESERVED_SIZE: usize = 4;

/// Byte offsets of the fields following an entry's name. All of them move
/// when the name length changes, so the layout is recomputed from the
/// current name length on every decode and encode, never cached across a
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryLayout {
    type_tag: usize,
    reserved: usize,
    sub_record_count: usize,
    sub_records: usize,
}

impl EntryLayout {
    fn new(name_len: usize) -> Self {
        let type_tag = K_NAME_OFFSET + name_len;
        let reserved = type_tag + K_TYPE_TAG_SIZE;
        let sub_record_count = reserved + K_RESERVED_SIZE;
        Self { type_tag, reserved, sub_record_count, sub_records: sub_record_count + 1 }
    }
}

/// One fixed-size record in an entry's tail, preserved as opaque bytes.
/// For surface resources each record describes a single mip level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubRecord(pub [u8; K_SUB_RECORD_SIZE]);

/// One named asset record inside an archive.
///
/// The on-disk length prefix and sub-record count are derived from the live
/// fields on encode rather than carried as state, so they can't drift when
/// an entry is renamed or its tail is edited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErpEntry {
    /// Path/filename bytes, trailing null terminator included.
    pub name: Vec<u8>,
    pub type_tag: TypeTag,
    /// Opaque block following the type tag, preserved verbatim.
    pub reserved: [u8; K_RESERVED_SIZE],
    pub sub_records: Vec<SubRecord>,
}

impl ErpEntry {
    /// Decodes one entry record, the 4-byte length prefix included.
    pub fn read(data: &[u8]) -> Result<ErpEntry> {
        if data.len() < K_NAME_OFFSET {
            return Err(Error::TruncatedEntry(format!(
                "record of {} bytes is shorter than its fixed fields",
                data.len()
            )));
        }
        let length = u32::from_le_bytes(*array_ref!(data, 0, 4)) as usize;
        let Some(data) = data.get(..length + 4) else {
            return Err(Error::TruncatedEntry(format!(
                "length prefix {length:#x} runs past the record end"
            )));
        };
        if data.len() < K_NAME_OFFSET {
            return Err(Error::TruncatedEntry(format!(
                "length prefix {length:#x} leaves no room for the name length"
            )));
        }
        let name_len = u16::from_le_bytes(*array_ref!(data, 4, 2)) as usize;
        let layout = EntryLayout::new(name_len);
        if data.len() < layout.sub_records {
            return Err(Error::TruncatedEntry(format!(
                "name of {name_len} bytes runs past the record end"
            )));
        }
        let tail = &data[layout.sub_records..];
        if tail.len() % K_SUB_RECORD_SIZE != 0 {
            return Err(Error::TruncatedEntry(format!(
                "{} tail bytes are not a whole number of sub-records",
                tail.len()
            )));
        }
        // The tail length is authoritative for the sub-record count; the
        // stored byte is only reported when it disagrees.
        let count = tail.len() / K_SUB_RECORD_SIZE;
        if count > u8::MAX as usize {
            return Err(Error::InvalidFormat(format!(
                "sub-record count {count} does not fit the count field"
            )));
        }
        let stored = data[layout.sub_record_count];
        if stored as usize != count {
            let name = &data[K_NAME_OFFSET..layout.type_tag];
            let name = name.strip_suffix(&[0]).unwrap_or(name);
            log::warn!(
                "entry '{}': stored sub-record count {} disagrees with tail length ({} records)",
                String::from_utf8_lossy(name),
                stored,
                count
            );
        }
        Ok(ErpEntry {
            name: data[K_NAME_OFFSET..layout.type_tag].to_vec(),
            type_tag: TypeTag(*array_ref!(data, layout.type_tag, K_TYPE_TAG_SIZE)),
            reserved: *array_ref!(data, layout.reserved, K_RESERVED_SIZE),
            sub_records: tail
                .chunks_exact(K_SUB_RECORD_SIZE)
                .map(|chunk| SubRecord(*array_ref!(chunk, 0, K_SUB_RECORD_SIZE)))
                .collect(),
        })
    }

    /// Encoded size of this entry on disk, length prefix included.
    pub fn encoded_len(&self) -> usize {
        EntryLayout::new(self.name.len()).sub_records
            + self.sub_records.len() * K_SUB_RECORD_SIZE
    }

    /// Re-encodes the entry, deriving the length prefix and sub-record
    /// count from the live fields.
    pub fn to_bytes(&self) -> Vec<u8> {
        let total = self.encoded_len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&((total - 4) as u32).to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&self.type_tag.0);
        out.extend_from_slice(&self.reserved);
        out.push(self.sub_records.len() as u8);
        for record in &self.sub_records {
            out.extend_from_slice(&record.0);
        }
        out
    }

    /// UTF-8 name with the trailing terminator stripped.
    pub fn display_name(&self) -> Cow<'_, str> {
        let name = self.name.strip_suffix(&[0]).unwrap_or(&self.name);
        String::from_utf8_lossy(name)
    }

    /// Builds a copy of this entry under a new name.
    ///
    /// When the current name carries an extension (first `.` up to the
    /// terminator) and `drop_extension` is unset, any extension supplied in
    /// `new_name` is discarded and the current one is appended. The single
    /// trailing terminator is retained either way.
    pub fn renamed(&self, new_name: &str, drop_extension: bool) -> Result<ErpEntry> {
        let current = self.display_name().into_owned();
        let mut name = match current.find('.') {
            Some(dot) if !drop_extension => {
                let base = new_name.find('.').map_or(new_name, |i| &new_name[..i]);
                let mut name = base.as_bytes().to_vec();
                name.extend_from_slice(current[dot..].as_bytes());
                name
            }
            _ => new_name.as_bytes().to_vec(),
        };
        name.push(0);
        if name.len() > u16::MAX as usize {
            return Err(Error::NameTooLong(name.len()));
        }
        Ok(ErpEntry { name, ..self.clone() })
    }

    /// Whether this entry is a surface resource still carrying its full
    /// mip set.
    pub fn has_removable_mip_set(&self) -> bool {
        self.type_tag.matches(K_TYPE_GFX_SURFACE) && self.sub_records.len() == K_FULL_MIP_SET
    }

    /// Drops the third sub-record, the highest-resolution mip level,
    /// leaving the two lower levels intact.
    pub fn remove_mip(&mut self) -> Result<()> {
        if !self.has_removable_mip_set() {
            return Err(Error::NoRemovableMips(self.display_name().into_owned()));
        }
        self.sub_records.remove(K_FULL_MIP_SET - 1);
        Ok(())
    }
}
