use crate::error::{LoadError, LoadResult};
use stowage_base::b3f::{B3FReader, B3FWriter};

const BUNDLE_FILE_TAG: [u8; 4] = *b"BNDL";
const BUNDLE_VERSION: u32 = 1;

/// An opened bundle. Only the name table is read when opening, entries are sliced out of the
/// payload when asked for.
///
/// On disk a bundle is a B3F container tagged `BNDL`. Block 0 holds the bincode-encoded entry
/// names, block `i + 1` holds the bytes of entry `i`.
pub struct AssetBundle {
    entry_names: Vec<String>,
    data: Vec<u8>,
}

impl std::fmt::Debug for AssetBundle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AssetBundle")
            .field("entry_names", &self.entry_names)
            .field("data_length", &self.data.len())
            .finish()
    }
}

impl AssetBundle {
    pub fn open(data: Vec<u8>) -> LoadResult<Self> {
        let entry_names = {
            let reader = B3FReader::new(&data)?;
            if reader.file_tag() != BUNDLE_FILE_TAG {
                return Err(LoadError::DecodeError(format!(
                    "bundle has file tag {:?}, expected {:?}",
                    reader.file_tag(),
                    BUNDLE_FILE_TAG
                )));
            }

            let entry_names: Vec<String> = bincode::deserialize(reader.get_block(0)?)?;
            if reader.block_count() != entry_names.len() + 1 {
                return Err(LoadError::DecodeError(format!(
                    "bundle lists {} entries but contains {} blocks",
                    entry_names.len(),
                    reader.block_count()
                )));
            }
            entry_names
        };

        Ok(AssetBundle { entry_names, data })
    }

    /// Writes a bundle containing the given named entries
    pub fn build(entries: &[(&str, &[u8])]) -> LoadResult<Vec<u8>> {
        let names: Vec<&str> = entries.iter().map(|(name, _)| *name).collect();
        let name_table = bincode::serialize(&names)?;

        let mut writer = B3FWriter::new(BUNDLE_FILE_TAG, BUNDLE_VERSION);
        writer.add_block(&name_table);
        for (_, data) in entries {
            writer.add_block(data);
        }

        Ok(writer.to_vec())
    }

    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    pub fn len(&self) -> usize {
        self.entry_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_names.is_empty()
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.entry_names.iter().any(|n| n == name)
    }

    pub fn entry(
        &self,
        name: &str,
    ) -> Option<&[u8]> {
        let index = self.entry_names.iter().position(|n| n == name)?;
        // The block count was validated in open()
        B3FReader::new(&self.data)
            .and_then(|reader| reader.get_block(index + 1))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadErrorCategory;

    #[test]
    fn entries_are_found_by_name() {
        let data = AssetBundle::build(&[
            ("intro.txt", b"welcome".as_slice()),
            ("empty", b"".as_slice()),
        ])
        .unwrap();

        let bundle = AssetBundle::open(data).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.entry_names(), &["intro.txt".to_string(), "empty".to_string()]);
        assert_eq!(bundle.entry("intro.txt"), Some(b"welcome".as_slice()));
        assert_eq!(bundle.entry("empty"), Some(b"".as_slice()));
        assert!(bundle.entry("missing").is_none());
        assert!(bundle.contains("empty"));
    }

    #[test]
    fn other_b3f_files_are_not_bundles() {
        let mut writer = B3FWriter::new(*b"MESH", 1);
        writer.add_block(b"vertices");
        let err = AssetBundle::open(writer.to_vec()).unwrap_err();
        assert_eq!(err.category(), LoadErrorCategory::Decode);
    }

    #[test]
    fn corrupt_offsets_are_a_decode_error() {
        let mut data = AssetBundle::build(&[("a", b"1".as_slice())]).unwrap();
        // Start of block 0, the name table
        data[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = AssetBundle::open(data).unwrap_err();
        assert_eq!(err.category(), LoadErrorCategory::Decode);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = AssetBundle::open(vec![0u8; 10]).unwrap_err();
        assert_eq!(err.category(), LoadErrorCategory::Decode);
    }
}
