use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;

/// The top-level pom elements the index cares about
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PomInfo {
    pub packaging: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn read_pom(path: &Path) -> Result<PomInfo> {
    let mut reader = Reader::from_reader(BufReader::new(File::open(path)?));
    let mut info = PomInfo::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(e.local_name().as_ref().to_vec()),
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) if stack.len() == 2 && stack[0] == b"project" => {
                let value = String::from_utf8_lossy(&text).trim().to_string();
                if !value.is_empty() {
                    match stack[1].as_slice() {
                        b"packaging" => info.packaging = Some(value),
                        b"name" => info.name = Some(value),
                        b"description" => info.description = Some(value),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_elements_are_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pom.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <parent><name>Parent</name><packaging>pom</packaging></parent>
  <name>Widget</name>
  <packaging>bundle</packaging>
</project>"#,
        )
        .unwrap();

        let info = read_pom(&path).unwrap();
        assert_eq!(info.packaging.as_deref(), Some("bundle"));
        assert_eq!(info.name.as_deref(), Some("Widget"));
        assert!(info.description.is_none());
    }
}
