/// Parser for Cobertura XML coverage reports (as written by gcovr
/// `--cobertura`, coverage.py, and others).
///
/// Cobertura XML structure:
///   <coverage line-rate="...">
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="..." line-rate="...">
///             <methods>
///               <method name="...">
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"/>
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Filenames are kept as written (relative to the `<source>` root), which is
/// what diff paths are matched against.
use std::collections::HashMap;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{CovgateError, Result};
use crate::model::*;
use crate::parsers::Parser;

pub struct CoberturaParser;

impl Parser for CoberturaParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse_cobertura(input)
    }
}

fn parse_cobertura(input: &[u8]) -> Result<CoverageData> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut data = CoverageData::new();
    let mut buf = Vec::new();

    let mut current_file: Option<FileCoverage> = None;
    // line number -> index into current_file.lines
    let mut line_index_map: HashMap<u32, usize> = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => {
                return Err(CovgateError::Xml {
                    source: e,
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"coverage" => {
                    let attrs = attr_map(e);
                    data.line_percent = attrs
                        .get("line-rate")
                        .and_then(|r| r.parse::<f64>().ok())
                        .map(|r| r * 100.0);
                }
                b"class" => {
                    let attrs = attr_map(e);
                    if let Some(filename) = attrs.get("filename") {
                        if let Some(file) = current_file.take() {
                            data.files.push(file);
                        }
                        let mut file = FileCoverage::new(filename.clone());
                        file.percent = attrs
                            .get("line-rate")
                            .and_then(|r| r.parse::<f64>().ok())
                            .map(|r| r * 100.0);
                        current_file = Some(file);
                        line_index_map.clear();
                    }
                }
                b"line" => {
                    if let Some(file) = current_file.as_mut() {
                        record_line(file, &mut line_index_map, &attr_map(e));
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"class" {
                    if let Some(file) = current_file.take() {
                        data.files.push(file);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    // Handle unclosed file
    if let Some(file) = current_file.take() {
        data.files.push(file);
    }

    Ok(data)
}

/// Add one `<line>` element to `file`. Lines may appear both under
/// `<method><lines>` and `<class><lines>`; keep the max hit_count for each.
fn record_line(
    file: &mut FileCoverage,
    line_index_map: &mut HashMap<u32, usize>,
    attrs: &HashMap<String, String>,
) {
    let Some(line_number) = attrs.get("number").and_then(|n| n.parse::<u32>().ok()) else {
        return;
    };
    let hit_count = attrs
        .get("hits")
        .and_then(|h| h.parse::<u64>().ok())
        .unwrap_or(0);

    if let Some(&idx) = line_index_map.get(&line_number) {
        let existing = &mut file.lines[idx];
        existing.hit_count = existing.hit_count.max(hit_count);
    } else {
        line_index_map.insert(line_number, file.lines.len());
        file.lines.push(LineCoverage {
            line_number,
            hit_count,
        });
    }
}

/// Extract attributes from an XML element into a HashMap.
fn attr_map(e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}
