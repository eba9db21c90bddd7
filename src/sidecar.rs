//! XMP Sidecar Extraction
//!
//! Pulls the camera-raw-settings attributes out of an XMP sidecar and flattens
//! them into a [`RawAttributeMap`]. No interpretation of values happens here;
//! see [`crate::normalize`] for typing and defaults.
//!
//! ## Layout handled
//!
//! - Attribute form: `<rdf:Description crs:Exposure2012="+0.50" .../>`
//! - Element form: `<rdf:Description><crs:Temperature>4726</crs:Temperature></rdf:Description>`
//! - Any number of `rdf:Description` nodes, at any depth. Later nodes overwrite
//!   earlier ones on key collision.
//!
//! ## Example
//!
//! ```rust
//! use soma_presets::sidecar::extract_attributes;
//!
//! let xmp = br#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
//!   <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
//!     <rdf:Description xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/"
//!       crs:Clarity2012="15"/>
//!   </rdf:RDF>
//! </x:xmpmeta>"#;
//!
//! let attrs = extract_attributes(xmp).unwrap();
//! assert_eq!(attrs.get("Clarity2012").map(String::as_str), Some("15"));
//! ```

use std::collections::HashMap;

use tracing::debug;
use xml::name::OwnedName;
use xml::reader::{EventReader, XmlEvent};

use crate::error::PresetError;

pub type Result<T> = std::result::Result<T, PresetError>;

/// Vendor namespace for camera-raw develop settings
pub const CRS_NAMESPACE: &str = "http://ns.adobe.com/camera-raw-settings/1.0/";

/// RDF syntax namespace
pub const RDF_NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Flat attribute local-name → raw string value
pub type RawAttributeMap = HashMap<String, String>;

/// Open element, as seen by the extractor
enum Frame {
    Description,
    /// Vendor element directly under a description
    Field {
        name: String,
        text: String,
        structured: bool,
    },
    Other,
}

/// Extract every camera-raw-settings value from sidecar bytes.
///
/// Fails with [`PresetError::MalformedInput`] when the bytes are not
/// well-formed XML, and with [`PresetError::NoVendorData`] when they parse but
/// carry nothing in [`CRS_NAMESPACE`].
pub fn extract_attributes(content: &[u8]) -> Result<RawAttributeMap> {
    let text = std::str::from_utf8(content)
        .map_err(|e| PresetError::MalformedInput(format!("not UTF-8: {}", e)))?;

    // Some writers pad the packet with a BOM or leading whitespace
    let text = text.trim_start_matches('\u{feff}').trim_start();

    let mut attrs = RawAttributeMap::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut saw_root = false;
    let mut descriptions = 0usize;

    for event in EventReader::new(text.as_bytes()) {
        let event = event.map_err(|e| PresetError::MalformedInput(e.to_string()))?;

        match event {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                saw_root = true;
                let in_description = matches!(stack.last(), Some(Frame::Description));
                if let Some(Frame::Field { structured, .. }) = stack.last_mut() {
                    *structured = true;
                }

                let frame = if is_rdf_description(&name) {
                    descriptions += 1;
                    for attribute in attributes {
                        if is_vendor(&attribute.name) {
                            insert_value(&mut attrs, attribute.name.local_name, attribute.value);
                        }
                    }
                    Frame::Description
                } else if in_description && is_vendor(&name) {
                    Frame::Field {
                        name: name.local_name,
                        text: String::new(),
                        structured: false,
                    }
                } else {
                    Frame::Other
                };
                stack.push(frame);
            }
            XmlEvent::Characters(chunk) | XmlEvent::CData(chunk) => {
                if let Some(Frame::Field { text, .. }) = stack.last_mut() {
                    text.push_str(&chunk);
                }
            }
            XmlEvent::EndElement { .. } => {
                if let Some(Frame::Field {
                    name,
                    text,
                    structured,
                }) = stack.pop()
                {
                    let text = text.trim();
                    if structured {
                        // Tone curves, masks and other nested values
                        debug!("skipping structured element crs:{}", name);
                    } else if !text.is_empty() {
                        insert_value(&mut attrs, name, text.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(PresetError::MalformedInput(
            "no root element found".to_string(),
        ));
    }
    debug!("found {} rdf:Description node(s)", descriptions);

    if attrs.is_empty() {
        return Err(PresetError::NoVendorData);
    }

    debug!("extracted {} camera-raw attribute(s)", attrs.len());
    Ok(attrs)
}

fn is_rdf_description(name: &OwnedName) -> bool {
    name.local_name == "Description" && name.namespace.as_deref() == Some(RDF_NAMESPACE)
}

fn is_vendor(name: &OwnedName) -> bool {
    name.namespace.as_deref() == Some(CRS_NAMESPACE)
}

/// Later values overwrite earlier ones
fn insert_value(attrs: &mut RawAttributeMap, key: String, value: String) {
    if let Some(previous) = attrs.get(&key) {
        if *previous != value {
            debug!("{} overwritten: {} -> {}", key, previous, value);
        }
    }
    attrs.insert(key, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(descriptions: &str) -> String {
        format!(
            r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Adobe XMP Core 7.0">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  {}
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
            descriptions
        )
    }

    #[test]
    fn test_extracts_vendor_attributes_only() {
        let xmp = wrap(
            r#"<rdf:Description rdf:about=""
                xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/"
                xmlns:tiff="http://ns.adobe.com/tiff/1.0/"
                tiff:Make="Canon"
                crs:Temperature="4726"
                crs:Tint="-2"
                crs:Clarity2012="+15"/>"#,
        );

        let attrs = extract_attributes(xmp.as_bytes()).unwrap();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs["Temperature"], "4726");
        assert_eq!(attrs["Tint"], "-2");
        assert_eq!(attrs["Clarity2012"], "+15");
        assert!(!attrs.contains_key("Make"));
    }

    #[test]
    fn test_prefix_other_than_crs() {
        let xmp = wrap(
            r#"<rdf:Description xmlns:acr="http://ns.adobe.com/camera-raw-settings/1.0/"
                acr:Exposure2012="50"/>"#,
        );

        let attrs = extract_attributes(xmp.as_bytes()).unwrap();
        assert_eq!(attrs["Exposure2012"], "50");
    }

    #[test]
    fn test_namespace_declared_on_ancestor() {
        let xmp = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"
            xmlns:cr="http://ns.adobe.com/camera-raw-settings/1.0/"
            xmlns:crs="http://example.com/not-camera-raw/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description cr:Temperature="5100" crs:Tint="9">
   <cr:Tint>-4</cr:Tint>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>"#;

        let attrs = extract_attributes(xmp.as_bytes()).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["Temperature"], "5100");
        assert_eq!(attrs["Tint"], "-4");
    }

    #[test]
    fn test_last_description_wins() {
        let xmp = wrap(
            r#"<rdf:Description xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/"
                crs:Contrast2012="10" crs:Dehaze="5"/>
               <rdf:Description xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/"
                crs:Contrast2012="30"/>"#,
        );

        let attrs = extract_attributes(xmp.as_bytes()).unwrap();
        assert_eq!(attrs["Contrast2012"], "30");
        assert_eq!(attrs["Dehaze"], "5");
    }

    #[test]
    fn test_element_form_values() {
        let xmp = wrap(
            r#"<rdf:Description xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/">
                 <crs:WhiteBalance>As Shot</crs:WhiteBalance>
                 <crs:ToneCurvePV2012>
                   <rdf:Seq><rdf:li>0, 0</rdf:li></rdf:Seq>
                 </crs:ToneCurvePV2012>
               </rdf:Description>"#,
        );

        let attrs = extract_attributes(xmp.as_bytes()).unwrap();
        assert_eq!(attrs["WhiteBalance"], "As Shot");
        assert!(!attrs.contains_key("ToneCurvePV2012"));
    }

    #[test]
    fn test_malformed_input() {
        let err = extract_attributes(b"<x:xmpmeta><rdf:RDF>").unwrap_err();
        assert!(matches!(err, PresetError::MalformedInput(_)));

        let err = extract_attributes(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, PresetError::MalformedInput(_)));

        let err = extract_attributes(b"garbage").unwrap_err();
        assert!(matches!(err, PresetError::MalformedInput(_)));

        let err = extract_attributes(b"").unwrap_err();
        assert!(matches!(err, PresetError::MalformedInput(_)));
    }

    #[test]
    fn test_no_vendor_data() {
        let xmp = wrap(
            r#"<rdf:Description xmlns:dc="http://purl.org/dc/elements/1.1/"
                dc:format="image/x-canon-cr2"/>"#,
        );

        let err = extract_attributes(xmp.as_bytes()).unwrap_err();
        assert!(matches!(err, PresetError::NoVendorData));
    }
}
