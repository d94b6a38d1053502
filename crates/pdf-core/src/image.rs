//! Image XObjects for signatures and other raster overlays

use crate::{PdfError, Result};
use image::{DynamicImage, GenericImageView, ImageReader};
use lopdf::{Dictionary, Object, Stream};
use std::io::{Cursor, Write};

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::ImageError(err.to_string())
    }
}

/// Detected image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Detect image format from magic bytes
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 8 {
        return Err(PdfError::ImageError("Image data too short".to_string()));
    }
    if data[..3] == [0xFF, 0xD8, 0xFF] {
        return Ok(ImageFormat::Jpeg);
    }
    if data[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Ok(ImageFormat::Png);
    }
    Err(PdfError::ImageError("Unknown image format".to_string()))
}

/// PDF color space of image samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
}

impl ColorSpace {
    fn name(self) -> &'static [u8] {
        match self {
            ColorSpace::DeviceGray => b"DeviceGray",
            ColorSpace::DeviceRgb => b"DeviceRGB",
            ColorSpace::DeviceCmyk => b"DeviceCMYK",
        }
    }
}

/// Stream filter of the sample data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    /// JPEG passthrough
    Dct,
    /// Zlib-compressed raw samples
    Flate,
}

impl ImageFilter {
    fn name(self) -> &'static [u8] {
        match self {
            ImageFilter::Dct => b"DCTDecode",
            ImageFilter::Flate => b"FlateDecode",
        }
    }
}

/// Image XObject ready to be added to a document
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub filter: ImageFilter,
    /// Encoded sample data
    pub data: Vec<u8>,
    /// Alpha channel as a DeviceGray soft mask
    pub soft_mask: Option<Box<ImageXObject>>,
}

/// JPEG frame header fields needed for passthrough
#[derive(Debug, Clone, Copy)]
struct JpegInfo {
    width: u32,
    height: u32,
    components: u8,
}

/// Scan JPEG segments for the first start-of-frame header
fn jpeg_info(data: &[u8]) -> Result<JpegInfo> {
    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        // SOFn, excluding DHT (C4), JPG (C8) and DAC (CC)
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return Ok(JpegInfo {
                height: u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32,
                width: u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32,
                components: data[i + 9],
            });
        }
        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 {
            break;
        }
        i += 2 + length;
    }
    Err(PdfError::ImageError("Could not parse JPEG header".to_string()))
}

fn zlib(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

impl ImageXObject {
    /// Build an XObject from JPEG or PNG bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match detect_format(data)? {
            ImageFormat::Jpeg => Self::from_jpeg(data),
            ImageFormat::Png => Self::from_png(data),
        }
    }

    /// JPEG data is embedded as-is with DCTDecode
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let info = jpeg_info(data)?;
        let color_space = match info.components {
            1 => ColorSpace::DeviceGray,
            4 => ColorSpace::DeviceCmyk,
            _ => ColorSpace::DeviceRgb,
        };
        Ok(Self {
            width: info.width,
            height: info.height,
            color_space,
            filter: ImageFilter::Dct,
            data: data.to_vec(),
            soft_mask: None,
        })
    }

    /// PNG data is decoded, split into color and alpha, and deflated
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let image = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()?;
        Self::from_image(&image)
    }

    /// Build an XObject from a decoded image, keeping transparency as a soft mask
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        let has_alpha = image.color().has_alpha();
        let grayscale = !image.color().has_color();

        let (raw, color_space) = if grayscale {
            (image.to_luma8().into_raw(), ColorSpace::DeviceGray)
        } else {
            (image.to_rgb8().into_raw(), ColorSpace::DeviceRgb)
        };

        let soft_mask = if has_alpha {
            let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p[3]).collect();
            Some(Box::new(Self {
                width,
                height,
                color_space: ColorSpace::DeviceGray,
                filter: ImageFilter::Flate,
                data: zlib(&alpha)?,
                soft_mask: None,
            }))
        } else {
            None
        };

        Ok(Self {
            width,
            height,
            color_space,
            filter: ImageFilter::Flate,
            data: zlib(&raw)?,
            soft_mask,
        })
    }

    /// Convert to a stream; the soft mask must already be in the document
    pub fn to_pdf_stream(&self, soft_mask: Option<lopdf::ObjectId>) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", self.width as i64);
        dict.set("Height", self.height as i64);
        dict.set("ColorSpace", Object::Name(self.color_space.name().to_vec()));
        dict.set("BitsPerComponent", 8i64);
        dict.set("Filter", Object::Name(self.filter.name().to_vec()));
        if let Some(mask_id) = soft_mask {
            dict.set("SMask", Object::Reference(mask_id));
        }
        Stream::new(dict, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png_bytes(with_alpha: bool) -> Vec<u8> {
        let img = ImageBuffer::from_fn(4, 2, |x, _| {
            let a = if with_alpha && x == 0 { 0 } else { 255 };
            Rgba([10u8, 20, 30, a])
        });
        let dynamic = if with_alpha {
            DynamicImage::ImageRgba8(img)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8())
        };
        let mut out = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_detect_formats() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(detect_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        assert_eq!(detect_format(&png_bytes(false)).unwrap(), ImageFormat::Png);
        assert!(detect_format(&[0u8; 8]).is_err());
        assert!(detect_format(&[0xFF, 0xD8]).is_err());
    }

    #[test]
    fn test_jpeg_header_parse() {
        // SOI, SOF0 with 3 components, 40x20
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08];
        jpeg.extend_from_slice(&20u16.to_be_bytes());
        jpeg.extend_from_slice(&40u16.to_be_bytes());
        jpeg.push(3);
        jpeg.extend_from_slice(&[0u8; 9]);
        let xobj = ImageXObject::from_jpeg(&jpeg).unwrap();
        assert_eq!((xobj.width, xobj.height), (40, 20));
        assert_eq!(xobj.color_space, ColorSpace::DeviceRgb);
        assert_eq!(xobj.filter, ImageFilter::Dct);
    }

    #[test]
    fn test_png_with_alpha_gets_soft_mask() {
        let xobj = ImageXObject::from_bytes(&png_bytes(true)).unwrap();
        assert_eq!((xobj.width, xobj.height), (4, 2));
        assert_eq!(xobj.color_space, ColorSpace::DeviceRgb);
        let mask = xobj.soft_mask.expect("alpha mask");
        assert_eq!(mask.color_space, ColorSpace::DeviceGray);
    }

    #[test]
    fn test_opaque_png_has_no_mask() {
        let xobj = ImageXObject::from_bytes(&png_bytes(false)).unwrap();
        assert!(xobj.soft_mask.is_none());
        assert_eq!(xobj.filter, ImageFilter::Flate);
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(ImageXObject::from_bytes(b"not an image at all").is_err());
    }

    #[test]
    fn test_stream_dict() {
        let xobj = ImageXObject::from_bytes(&png_bytes(false)).unwrap();
        let stream = xobj.to_pdf_stream(Some((7, 0)));
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert_eq!(
            stream.dict.get(b"SMask").unwrap().as_reference().unwrap(),
            (7, 0)
        );
    }
}
