//! PFM 浮点图像读写
//!
//! 文件头三行：
//! - `PF`（3 通道）或 `Pf`（单通道）
//! - `width height`
//! - scale，符号表示字节序：正数为大端，负数为小端
//!
//! 之后是 `width * height * channels` 个 f32，行序自下而上。

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use ndarray::{Array2, Array3, Axis};

use super::{DepthRaster, Endianness};
use crate::error::{DatasetError, Result};

const MAGIC_COLOR: &str = "PF";
const MAGIC_GRAY: &str = "Pf";

pub fn read_pfm(path: impl AsRef<Path>) -> Result<DepthRaster> {
    let path = path.as_ref();
    let file = File::open(path)?;
    decode(BufReader::new(file)).map_err(|err| match err {
        DatasetError::Format { reason, .. } => DatasetError::format(path, reason),
        err => err,
    })
}

/// 从任意 reader 解码，错误中的路径为空。
pub fn decode<R: BufRead>(mut reader: R) -> Result<DepthRaster> {
    let magic = read_header_line(&mut reader, "magic")?;
    let channels = match magic.as_str() {
        MAGIC_COLOR => 3,
        MAGIC_GRAY => 1,
        other => return Err(DatasetError::format("", format!("unknown magic {other:?}"))),
    };

    let dims = read_header_line(&mut reader, "dimensions")?;
    let (width, height) = parse_dims(&dims)?;

    let scale_line = read_header_line(&mut reader, "scale")?;
    let scale: f32 = scale_line
        .trim()
        .parse()
        .map_err(|_| DatasetError::format("", format!("invalid scale {scale_line:?}")))?;
    let endianness = if scale > 0.0 {
        Endianness::Big
    } else {
        Endianness::Little
    };

    let (count, byte_count) = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .and_then(|n| Some((n, n.checked_mul(4)?)))
        .ok_or_else(|| {
            DatasetError::format("", format!("dimensions {width}x{height} overflow"))
        })?;
    // 按实际读到的字节分配，不信任文件头
    let mut payload = Vec::new();
    reader
        .by_ref()
        .take(byte_count as u64)
        .read_to_end(&mut payload)?;
    if payload.len() < byte_count {
        return Err(DatasetError::format(
            "",
            format!(
                "truncated payload: expected {} bytes, found {}",
                byte_count,
                payload.len()
            ),
        ));
    }

    let mut values = vec![0f32; count];
    let bytes = &payload[..byte_count];
    match endianness {
        Endianness::Big => BigEndian::read_f32_into(bytes, &mut values),
        Endianness::Little => LittleEndian::read_f32_into(bytes, &mut values),
    }

    let mut data = Array3::from_shape_vec((height, width, channels), values)
        .map_err(|err| DatasetError::format("", err.to_string()))?;
    // 行序自下而上，翻转为自上而下
    data.invert_axis(Axis(0));
    let data = data.as_standard_layout().into_owned();

    Ok(DepthRaster {
        data,
        scale: scale.abs(),
        endianness,
    })
}

pub fn write_pfm(path: impl AsRef<Path>, raster: &DepthRaster) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    encode(&mut writer, raster)?;
    writer.flush()?;
    Ok(())
}

/// 单通道平面包装为小端序 raster，用于导出
pub fn plane_to_raster(plane: &Array2<f32>) -> DepthRaster {
    DepthRaster {
        data: plane.clone().insert_axis(Axis(2)),
        scale: 1.0,
        endianness: Endianness::Little,
    }
}

/// [decode] 的逆过程
pub fn encode<W: Write>(writer: &mut W, raster: &DepthRaster) -> Result<()> {
    let (height, width, channels) = raster.data.dim();
    let magic = match channels {
        3 => MAGIC_COLOR,
        1 => MAGIC_GRAY,
        n => {
            return Err(DatasetError::format(
                "",
                format!("cannot encode {n} channels"),
            ))
        }
    };
    let scale = match raster.endianness {
        Endianness::Big => raster.scale.abs(),
        Endianness::Little => -raster.scale.abs(),
    };
    write!(writer, "{magic}\n{width} {height}\n{scale}\n")?;

    for row in raster.data.axis_iter(Axis(0)).rev() {
        for &v in row.iter() {
            match raster.endianness {
                Endianness::Big => writer.write_f32::<BigEndian>(v)?,
                Endianness::Little => writer.write_f32::<LittleEndian>(v)?,
            }
        }
    }
    Ok(())
}

fn read_header_line<R: BufRead>(reader: &mut R, what: &str) -> Result<String> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Err(DatasetError::format("", format!("missing {what} line")));
    }
    // latin1
    let line: String = buf.iter().map(|&b| b as char).collect();
    Ok(line.trim_end().to_string())
}

fn parse_dims(line: &str) -> Result<(usize, usize)> {
    let invalid = || DatasetError::format("", format!("invalid dimensions {line:?}"));
    let dims = line
        .split_whitespace()
        .map(|s| s.parse::<i64>().map_err(|_| invalid()))
        .collect::<Result<Vec<i64>>>()?;
    match dims.as_slice() {
        &[width, height] if width > 0 && height > 0 => {
            let width = usize::try_from(width).map_err(|_| invalid())?;
            let height = usize::try_from(height).map_err(|_| invalid())?;
            Ok((width, height))
        }
        _ => Err(invalid()),
    }
}
