//! PDF Document wrapper

use crate::content::{
    generate_image_operators, generate_text_operators, hex_string, TextRenderContext,
    ISOLATE_CLOSE, ISOLATE_OPEN,
};
use crate::image::ImageXObject;
use crate::standard_font::{encode_win_ansi, StandardFont};
use crate::{PdfError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

/// A4 portrait in points, used when a page declares no box at all
const A4: (f64, f64) = (595.28, 841.89);

/// Overlay work queued for one page until the document is written
#[derive(Debug, Default)]
struct PageOverlay {
    fonts: BTreeSet<StandardFont>,
    images: BTreeMap<String, ObjectId>,
    content: Vec<u8>,
}

/// PDF Document wrapper for drawing overlays onto an existing template
///
/// Coordinates are PDF-native: points, origin at the bottom-left corner.
/// Overlay content is buffered per page object, so pages can be duplicated
/// or inserted while drawing without invalidating earlier work.
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Font dictionaries already added to the document
    font_objects: HashMap<StandardFont, ObjectId>,
    /// Embedded images (data hash -> image XObject ID)
    embedded_images: HashMap<u64, ObjectId>,
    /// Next image resource number
    next_image_resource: u32,
    /// Pending overlays keyed by page object
    pending: HashMap<ObjectId, PageOverlay>,
}

impl PdfDocument {
    fn from_document(inner: Document) -> Self {
        Self {
            inner,
            font_objects: HashMap::new(),
            embedded_images: HashMap::new(),
            next_image_resource: 1,
            pending: HashMap::new(),
        }
    }

    /// Open a PDF document from bytes
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::open_from_bytes(&template)?;
    /// ```
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Object ID of a page (1-indexed)
    pub fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        pages
            .get(&(page as u32))
            .copied()
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    /// Page width and height in points, honoring inherited boxes
    pub fn page_size(&self, page: usize) -> Result<(f64, f64)> {
        let page_id = self.page_id(page)?;
        let media_box = self
            .inherited_attribute(page_id, b"MediaBox")
            .or_else(|| self.inherited_attribute(page_id, b"CropBox"));

        let Some(media_box) = media_box else {
            return Ok(A4);
        };
        let values = self
            .resolve(&media_box)
            .as_array()
            .map_err(|_| PdfError::ParseError("MediaBox is not an array".to_string()))?
            .iter()
            .map(number)
            .collect::<Option<Vec<f64>>>()
            .filter(|v| v.len() >= 4)
            .ok_or_else(|| PdfError::ParseError("Invalid MediaBox format".to_string()))?;

        Ok(((values[2] - values[0]).abs(), (values[3] - values[1]).abs()))
    }

    /// Width of `text` in points for a standard font
    pub fn text_width(&self, text: &str, font: StandardFont, size: f32) -> f64 {
        font.text_width(text, size)
    }

    /// Draw text with its baseline starting at (x, y)
    ///
    /// # Arguments
    /// * `text` - Text to draw; empty text draws nothing
    /// * `page` - Page number (1-indexed)
    /// * `x` - X coordinate in points from the left edge
    /// * `y` - Baseline Y coordinate in points from the bottom edge
    /// * `font` - Standard font to use
    /// * `size` - Font size in points
    pub fn draw_text(
        &mut self,
        text: &str,
        page: usize,
        x: f64,
        y: f64,
        font: StandardFont,
        size: f32,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        if text.is_empty() {
            return Ok(());
        }

        let ctx = TextRenderContext {
            font_name: font.resource_name().to_string(),
            font_size: size,
        };
        let operators = generate_text_operators(&hex_string(&encode_win_ansi(text)), x, y, &ctx);

        let overlay = self.pending.entry(page_id).or_default();
        overlay.fonts.insert(font);
        overlay.content.extend_from_slice(&operators);
        Ok(())
    }

    /// Draw a JPEG or PNG image stretched into a box
    ///
    /// # Arguments
    /// * `data` - Image file bytes
    /// * `page` - Page number (1-indexed)
    /// * `x` - Lower-left X in points
    /// * `y` - Lower-left Y in points
    /// * `width` - Box width in points
    /// * `height` - Box height in points
    pub fn draw_image(
        &mut self,
        data: &[u8],
        page: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let image_id = self.embed_image(data)?;

        let overlay = self.pending.entry(page_id).or_default();
        let resource_name = match overlay.images.iter().find(|(_, id)| **id == image_id) {
            Some((name, _)) => name.clone(),
            None => {
                let name = format!("HvIm{}", self.next_image_resource);
                self.next_image_resource += 1;
                overlay.images.insert(name.clone(), image_id);
                name
            }
        };

        let operators = generate_image_operators(&resource_name, x, y, width, height);
        overlay.content.extend_from_slice(&operators);
        Ok(())
    }

    /// Add image XObjects once per distinct image
    fn embed_image(&mut self, data: &[u8]) -> Result<ObjectId> {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        let data_hash = hasher.finish();

        if let Some(id) = self.embedded_images.get(&data_hash) {
            return Ok(*id);
        }

        let xobject = ImageXObject::from_bytes(data)?;
        let mask_id = xobject
            .soft_mask
            .as_ref()
            .map(|mask| self.inner.add_object(mask.to_pdf_stream(None)));
        let id = self.inner.add_object(xobject.to_pdf_stream(mask_id));
        self.embedded_images.insert(data_hash, id);
        Ok(id)
    }

    /// Append a blank page of the given size at the end of the document
    ///
    /// # Returns
    /// New page number (1-indexed)
    pub fn add_blank_page(&mut self, width: f64, height: f64) -> Result<usize> {
        let root_pages = self.root_pages_id()?;
        let contents_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), Vec::new()));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(root_pages));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ]),
        );
        page_dict.set("Resources", Object::Dictionary(Dictionary::new()));
        page_dict.set("Contents", Object::Reference(contents_id));
        let page_id = self.inner.add_object(page_dict);

        let kids = self.kids_mut(root_pages)?;
        kids.push(Object::Reference(page_id));
        self.bump_counts(root_pages)?;

        Ok(self.page_count())
    }

    /// Copy a page and insert the copy directly after it
    ///
    /// The copy shares the source's content streams and resources as they
    /// were in the template; overlay content already queued for the source
    /// page is not carried over.
    ///
    /// # Returns
    /// Page number of the copy, always `page + 1`
    pub fn duplicate_page_after(&mut self, page: usize) -> Result<usize> {
        let source_id = self.page_id(page)?;
        let source = self
            .inner
            .get_object(source_id)?
            .as_dict()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?
            .clone();

        let parent_id = source
            .get(b"Parent")
            .and_then(Object::as_reference)
            .map_err(|_| PdfError::ParseError("Page has no Parent".to_string()))?;

        let mut copy = source;
        // Inherited attributes become explicit so the copy renders identically
        for key in [&b"Resources"[..], &b"MediaBox"[..], &b"CropBox"[..], &b"Rotate"[..]] {
            if copy.get(key).is_err() {
                if let Some(value) = self.inherited_attribute(source_id, key) {
                    copy.set(key.to_vec(), value);
                }
            }
        }
        let copy_id = self.inner.add_object(copy);

        let kids = self.kids_mut(parent_id)?;
        let position = kids
            .iter()
            .position(|kid| kid.as_reference().ok() == Some(source_id))
            .ok_or_else(|| PdfError::ParseError("Page missing from parent Kids".to_string()))?;
        kids.insert(position + 1, Object::Reference(copy_id));
        self.bump_counts(parent_id)?;

        Ok(page + 1)
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.flush_overlays()?;
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(buffer)
    }

    /// Write every queued overlay into its page
    ///
    /// The template's own content is wrapped in q/Q so an unbalanced
    /// graphics state in the template cannot move the overlay.
    fn flush_overlays(&mut self) -> Result<()> {
        let pending: Vec<(ObjectId, PageOverlay)> = self.pending.drain().collect();

        for (page_id, overlay) in pending {
            if overlay.content.is_empty() {
                continue;
            }

            let mut resources = self
                .inherited_attribute(page_id, b"Resources")
                .and_then(|obj| self.resolve(&obj).as_dict().ok().cloned())
                .unwrap_or_default();

            if !overlay.fonts.is_empty() {
                let mut fonts = self.sub_dictionary(&resources, b"Font");
                for font in &overlay.fonts {
                    let font_id = self.font_object(*font);
                    fonts.set(font.resource_name(), Object::Reference(font_id));
                }
                resources.set("Font", Object::Dictionary(fonts));
            }

            if !overlay.images.is_empty() {
                let mut xobjects = self.sub_dictionary(&resources, b"XObject");
                for (name, id) in &overlay.images {
                    xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
                }
                resources.set("XObject", Object::Dictionary(xobjects));
            }

            let mut contents = vec![Object::Reference(
                self.inner
                    .add_object(Stream::new(Dictionary::new(), ISOLATE_OPEN.to_vec())),
            )];
            contents.extend(self.existing_content_refs(page_id)?);
            let mut tail = ISOLATE_CLOSE.to_vec();
            tail.extend_from_slice(&overlay.content);
            contents.push(Object::Reference(
                self.inner.add_object(Stream::new(Dictionary::new(), tail)),
            ));

            let page = self.inner.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Resources", Object::Dictionary(resources));
            page.set("Contents", Object::Array(contents));
        }

        Ok(())
    }

    /// Existing page content as a list of stream references
    fn existing_content_refs(&mut self, page_id: ObjectId) -> Result<Vec<Object>> {
        let contents = match self.inner.get_object(page_id)?.as_dict()?.get(b"Contents") {
            Ok(obj) => obj.clone(),
            Err(_) => return Ok(Vec::new()),
        };

        let refs = match contents {
            Object::Reference(id) => match self.inner.get_object(id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(id)],
            },
            Object::Array(items) => items,
            Object::Stream(stream) => vec![Object::Reference(self.inner.add_object(stream))],
            _ => Vec::new(),
        };

        Ok(refs
            .into_iter()
            .map(|item| match item {
                Object::Stream(stream) => Object::Reference(self.inner.add_object(stream)),
                other => other,
            })
            .collect())
    }

    fn font_object(&mut self, font: StandardFont) -> ObjectId {
        if let Some(id) = self.font_objects.get(&font) {
            return *id;
        }
        let id = self.inner.add_object(font.to_font_dict());
        self.font_objects.insert(font, id);
        id
    }

    /// Clone a resource sub-dictionary, following a reference if needed
    fn sub_dictionary(&self, resources: &Dictionary, key: &[u8]) -> Dictionary {
        resources
            .get(key)
            .ok()
            .and_then(|obj| self.resolve(obj).as_dict().ok().cloned())
            .unwrap_or_default()
    }

    /// Follow a single indirect reference
    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.inner.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    /// Look up a page attribute, walking up the page tree
    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = page_id;
        // Page trees deeper than this are malformed
        for _ in 0..32 {
            let dict = self.inner.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value.clone());
            }
            current = dict.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }

    fn root_pages_id(&self) -> Result<ObjectId> {
        let catalog_id = self
            .inner
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfError::ParseError("Document trailer missing Root".to_string()))?;
        self.inner
            .get_object(catalog_id)?
            .as_dict()?
            .get(b"Pages")
            .and_then(Object::as_reference)
            .map_err(|_| PdfError::ParseError("Catalog missing Pages entry".to_string()))
    }

    fn kids_mut(&mut self, pages_id: ObjectId) -> Result<&mut Vec<Object>> {
        match self.inner.get_object_mut(pages_id)?.as_dict_mut()?.get_mut(b"Kids") {
            Ok(Object::Array(kids)) => Ok(kids),
            _ => Err(PdfError::ParseError(
                "Pages node missing Kids array".to_string(),
            )),
        }
    }

    /// Increment Count on a pages node and all of its ancestors
    fn bump_counts(&mut self, pages_id: ObjectId) -> Result<()> {
        let mut current = Some(pages_id);
        while let Some(id) = current {
            let node = self.inner.get_object_mut(id)?.as_dict_mut()?;
            let count = node.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
            node.set("Count", Object::Integer(count + 1));
            current = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
        Ok(())
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}
