use std::io::Cursor;

use curator_core::{FeedDocument, OutputItem};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("failed to write xml: {0}")]
    Xml(String),
    #[error("rendered document is not utf-8")]
    Utf8,
}

/// `ctime`-style stamp written into `<time>`.
const GENERATED_AT_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Serialize the document as RSS 2.0. Identical documents render to
/// identical bytes.
pub fn render_feed(document: &FeedDocument) -> Result<String, RenderError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    emit(&mut writer, Event::Start(rss))?;

    let stamp = document.generated_at.format(GENERATED_AT_FORMAT).to_string();
    text_element(&mut writer, "time", &stamp)?;

    emit(&mut writer, Event::Start(BytesStart::new("channel")))?;
    text_element(&mut writer, "title", &document.channel.title)?;
    text_element(&mut writer, "link", &document.channel.link)?;
    text_element(&mut writer, "description", &document.channel.description)?;
    for item in &document.items {
        render_item(&mut writer, item)?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("channel")))?;
    emit(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|_| RenderError::Utf8)
}

fn render_item(writer: &mut Writer<Cursor<Vec<u8>>>, item: &OutputItem) -> Result<(), RenderError> {
    emit(writer, Event::Start(BytesStart::new("item")))?;
    text_element(writer, "title", &item.title)?;
    text_element(writer, "description", &item.description)?;
    if let Some(link) = &item.link {
        text_element(writer, "link", link)?;
    }
    if let Some(image) = &item.image {
        text_element(writer, "linkfoto", image.path())?;
    }
    if let Some(published) = &item.published {
        text_element(writer, "pubDate", &published.to_rfc2822())?;
    }
    emit(writer, Event::End(BytesEnd::new("item")))
}

fn text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &str) -> Result<(), RenderError> {
    if value.is_empty() {
        return emit(writer, Event::Empty(BytesStart::new(name)));
    }
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), RenderError> {
    writer
        .write_event(event)
        .map_err(|err| RenderError::Xml(err.to_string()))
}
