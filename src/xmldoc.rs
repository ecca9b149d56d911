#![allow(non_snake_case, non_upper_case_globals)]

/*!
A stand-in for the binary-XML codec the container format embeds its
manifest in: a compact binary transducer exposing `to_binary`/`from_binary`/
`is_binary_xml`/`encoding`, treated as opaque by every other module. No such
codec is available as a dependency here, so this module plays that role on
top of `quick-xml`'s UTF-8 event stream — every other module only ever sees
the logical [`Element`] tree below and never needs to know the wire format
changed.
*/

use std::collections::HashMap;
use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// The magic four bytes this module prefixes its encoded form with, so
/// `is_binary_xml` can tell its own payloads apart from plain UTF-8 XML.
const MAGIC: &[u8; 4] = b"\0BXT";

/// One node of the logical manifest/info-XML tree (the `__type`
/// attribute is kept like any other attribute; callers that care about
/// it read it explicitly).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element
{
	pub tag: String,
	pub attrs: HashMap<String, String>,
	pub children: Vec<Element>,
	/// Text content, present on leaf elements: a folder's timestamp or a
	/// file's `"OFFSET SIZE TIMESTAMP"` encoding.
	pub text: Option<String>,
}

impl Element
{
	pub fn new(tag: impl Into<String>) -> Self
	{
		return Self { tag: tag.into(), ..Default::default() };
	}

	pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self
	{
		return Self { tag: tag.into(), text: Some(text.into()), ..Default::default() };
	}

	pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self
	{
		self.attrs.insert(key.into(), value.into());
		return self;
	}

	pub fn push(mut self, child: Element) -> Self
	{
		self.children.push(child);
		return self;
	}

	pub fn child(&self, tag: &str) -> Option<&Element>
	{
		return self.children.iter().find(|c| c.tag == tag);
	}

	pub fn child_mut(&mut self, tag: &str) -> Option<&mut Element>
	{
		return self.children.iter_mut().find(|c| c.tag == tag);
	}
}

/// A logical XML document plus the declared text encoding, since
/// [`super::tree::texture`]'s MD5 hashing is defined over the document's
/// declared encoding, not a hardcoded one.
#[derive(Clone, Debug)]
pub struct XmlDoc
{
	pub root: Element,
	pub encoding: String,
}

impl XmlDoc
{
	pub fn new(root: Element) -> Self
	{
		return Self { root, encoding: "utf-8".to_string() };
	}
}

/// True if `data` was produced by [`to_binary`] (the [`MAGIC`] prefix).
pub fn is_binary_xml(data: &[u8]) -> bool
{
	return data.starts_with(MAGIC);
}

/// Encode a document to this module's wire form: the [`MAGIC`] prefix,
/// the declared encoding as a length-prefixed string, then a UTF-8 XML
/// serialization of the tree.
pub fn to_binary(doc: &XmlDoc) -> Result<Vec<u8>>
{
	let mut writer = Writer::new(Vec::new());
	write_element(&mut writer, &doc.root)?;
	let xml_bytes = writer.into_inner();

	let mut out = Vec::with_capacity(xml_bytes.len() + doc.encoding.len() + 5);
	out.extend_from_slice(MAGIC);
	out.push(doc.encoding.len() as u8);
	out.extend_from_slice(doc.encoding.as_bytes());
	out.extend_from_slice(&xml_bytes);
	return Ok(out);
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()>
{
	let mut start = BytesStart::new(element.tag.clone());
	for (key, value) in &element.attrs
	{
		start.push_attribute((key.as_str(), value.as_str()));
	}

	if element.children.is_empty() && element.text.is_none()
	{
		writer.write_event(Event::Empty(start)).context("Failed to write empty element")?;
		return Ok(());
	}

	writer.write_event(Event::Start(start)).context("Failed to write element start")?;
	if let Some(text) = &element.text
	{
		writer.write_event(Event::Text(BytesText::new(text))).context("Failed to write element text")?;
	}
	for child in &element.children
	{
		write_element(writer, child)?;
	}
	writer
		.write_event(Event::End(quick_xml::events::BytesEnd::new(element.tag.clone())))
		.context("Failed to write element end")?;
	return Ok(());
}

/// Decode a document previously produced by [`to_binary`].
pub fn from_binary(data: &[u8]) -> Result<XmlDoc>
{
	anyhow::ensure!(is_binary_xml(data), "not a recognized binary XML payload");
	let mut pos = MAGIC.len();
	let enc_len = *data.get(pos).context("truncated binary XML encoding length")? as usize;
	pos += 1;
	let encoding = std::str::from_utf8(&data[pos..pos + enc_len])
		.context("binary XML declared encoding is not valid UTF-8")?
		.to_string();
	pos += enc_len;

	let root = parse_xml(&data[pos..])?;
	return Ok(XmlDoc { root, encoding });
}

/// Parse a plain UTF-8 XML document (e.g. a file loaded straight off
/// disk, not wrapped by [`to_binary`]) into the logical tree.
pub fn parse_xml(data: &[u8]) -> Result<Element>
{
	let mut reader = Reader::from_reader(data);
	reader.config_mut().trim_text(true);

	let mut stack: Vec<Element> = Vec::new();
	let mut root: Option<Element> = None;
	let mut buf = Vec::new();

	loop
	{
		match reader.read_event_into(&mut buf).context("Failed to parse manifest XML")?
		{
			Event::Start(e) =>
			{
				stack.push(element_from_start(&e)?);
			}
			Event::Empty(e) =>
			{
				let el = element_from_start(&e)?;
				push_finished(&mut stack, &mut root, el);
			}
			Event::Text(t) =>
			{
				let text = t.unescape().context("Failed to unescape element text")?.into_owned();
				if let Some(top) = stack.last_mut()
				{
					if !text.trim().is_empty()
					{
						top.text = Some(text);
					}
				}
			}
			Event::End(_) =>
			{
				let el = stack.pop().context("Unbalanced closing tag in manifest XML")?;
				push_finished(&mut stack, &mut root, el);
			}
			Event::Eof => break,
			_ => {}
		}
		buf.clear();
	}

	return root.context("manifest XML has no root element");
}

fn push_finished(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element)
{
	match stack.last_mut()
	{
		Some(parent) => parent.children.push(el),
		None => *root = Some(el),
	}
}

fn element_from_start(e: &BytesStart) -> Result<Element>
{
	let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
	let mut attrs = HashMap::new();
	for attr in e.attributes()
	{
		let attr = attr.context("Failed to read element attribute")?;
		let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
		let value = attr.unescape_value().context("Failed to unescape attribute value")?.into_owned();
		attrs.insert(key, value);
	}
	return Ok(Element { tag, attrs, children: Vec::new(), text: None });
}

/// Serialize `element` as plain UTF-8 XML (used for the `.xml` files a
/// repack writes straight to disk, which are not wrapped in the binary
/// form — only the manifest itself and MD5-folder info files are).
pub fn to_plain_xml(element: &Element) -> Result<Vec<u8>>
{
	let mut writer = Writer::new(Vec::new());
	write_element(&mut writer, element)?;
	return Ok(writer.into_inner());
}

#[allow(unused)]
pub fn qname_str(name: QName) -> String
{
	return String::from_utf8_lossy(name.as_ref()).into_owned();
}
