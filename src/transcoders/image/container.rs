//! hand-written serializers for the two raster targets the `image` encoders
//! are not used for: 24-bit uncompressed BMP and single-entry PNG-in-ICO

use ::image::RgbaImage;

const BMP_FILE_HEADER_LEN: u32 = 14;
const BMP_INFO_HEADER_LEN: u32 = 40;
// 72 DPI
const BMP_PIXELS_PER_METER: i32 = 2835;

const ICO_HEADER_LEN: u32 = 6;
const ICO_ENTRY_LEN: u32 = 16;

/// bytes per BMP row: 3 per pixel, padded to a 4-byte boundary
pub fn bmp_row_size(width: u32) -> u32 {
    (width * 3).div_ceil(4) * 4
}

/// serializes a surface as a top-down 24-bit BGR bitmap; alpha is ignored
pub fn encode_bmp(surface: &RgbaImage) -> Vec<u8> {
    let (width, height) = surface.dimensions();
    let row_size = bmp_row_size(width);
    let pixel_data_size = row_size * height;
    let data_offset = BMP_FILE_HEADER_LEN + BMP_INFO_HEADER_LEN;
    let file_size = data_offset + pixel_data_size;

    let mut out = Vec::with_capacity(file_size as usize);

    // file header
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&data_offset.to_le_bytes());

    // BITMAPINFOHEADER; negative height means rows are stored top-down
    out.extend_from_slice(&BMP_INFO_HEADER_LEN.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(-(height as i32)).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&pixel_data_size.to_le_bytes());
    out.extend_from_slice(&BMP_PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&BMP_PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let padding = (row_size - width * 3) as usize;
    for row in surface.rows() {
        for pixel in row {
            let [r, g, b, _] = pixel.0;
            out.extend_from_slice(&[b, g, r]);
        }
        out.extend(std::iter::repeat_n(0u8, padding));
    }

    out
}

/// wraps an encoded PNG in an ICO container with one directory entry
///
/// the entry's width/height are single bytes, where 0 stands for 256
pub fn encode_ico(png: &[u8], width: u32, height: u32) -> Vec<u8> {
    let dimension_byte = |d: u32| if d > 255 { 0u8 } else { d as u8 };
    let image_offset = ICO_HEADER_LEN + ICO_ENTRY_LEN;

    let mut out = Vec::with_capacity(image_offset as usize + png.len());

    // ICONDIR: reserved, type 1 (icon), one image
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());

    // ICONDIRENTRY
    out.push(dimension_byte(width));
    out.push(dimension_byte(height));
    out.push(0); // palette size
    out.push(0); // reserved
    out.extend_from_slice(&1u16.to_le_bytes()); // color planes
    out.extend_from_slice(&32u16.to_le_bytes()); // bits per pixel
    out.extend_from_slice(&(png.len() as u32).to_le_bytes());
    out.extend_from_slice(&image_offset.to_le_bytes());

    out.extend_from_slice(png);
    out
}
