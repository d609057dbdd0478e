//! Access to the parts of an in-memory workbook package.

use crate::error::DecodeError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Uploaded workbook package held in memory.
pub(crate) type Archive = ZipArchive<Cursor<Vec<u8>>>;

/// Opens uploaded bytes as a zip package.
pub(crate) fn open_archive(bytes: Vec<u8>) -> Result<Archive, DecodeError> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Looks a part up by name, ignoring ASCII case and accepting `\` separators.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, DecodeError>;

    /// True when the package contains the part `name`.
    fn contains(&self, name: &str) -> bool;

    /// Reads a whole part into memory.
    fn read_to_vec(&mut self, name: &str) -> Result<Option<Vec<u8>>, DecodeError>;

    /// Streams a part through an [`XmlReader`].
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, DecodeError>;
}

fn find_name<'n>(mut names: impl Iterator<Item = &'n str>, name: &str) -> Option<String> {
    let pattern = name.replace('\\', "/");
    names
        .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
        .map(str::to_owned)
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, DecodeError> {
        let path = find_name(self.file_names(), name);
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn contains(&self, name: &str) -> bool {
        find_name(self.file_names(), name).is_some()
    }

    fn read_to_vec(&mut self, name: &str) -> Result<Option<Vec<u8>>, DecodeError> {
        match self.file(name)? {
            Some(mut file) => {
                let mut buffer = Vec::new();
                file.read_to_end(&mut buffer)?;
                Ok(Some(buffer))
            }
            None => Ok(None),
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, DecodeError> {
        Ok(self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file))))
    }
}
