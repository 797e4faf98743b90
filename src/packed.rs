//! Packed binary layout of a sequence set.
//!
//! One contiguous little-endian buffer:
//!
//! ```text
//! | varsize | header | bbox | offsets[maxcount] | sequence_0 | … |
//! ```
//!
//! The 4-byte varsize leads, matching the host database's varlena
//! convention; every variable-length field is padded to 8 bytes; offsets are
//! relative to the end of the offsets array. The in-memory value owns its
//! sequences in a plain vector, so this module is the only place the packed
//! form exists: `encode` lays it out, `decode` validates it and rebuilds the
//! owned value.

use crate::error::{Result, TemporalError};
use crate::inst::TInstant;
use crate::seq::TSequence;
use crate::seqset::TSequenceSet;
use bytes::{BufMut, Bytes, BytesMut};
use tempo_types::period::Period;
use tempo_types::time::Timestamp;
use tempo_types::value::{Interpolation, PointValue, TempType, Value};

const SUBTYPE_SEQUENCE: u8 = 2;
const SUBTYPE_SEQUENCESET: u8 = 3;

// Flag bits; the on-disk positions are private to this codec.
const FLAG_CONTINUOUS: u8 = 1 << 0;
const FLAG_INTERP_SHIFT: u8 = 1;
const FLAG_INTERP_MASK: u8 = 0b110;
const FLAG_X: u8 = 1 << 3;
const FLAG_Z: u8 = 1 << 4;
const FLAG_T: u8 = 1 << 5;
const FLAG_GEODETIC: u8 = 1 << 6;

fn double_pad(n: usize) -> usize {
    (n + 7) & !7
}

fn pad_to(buf: &mut BytesMut, boundary_from: usize) {
    let padded = double_pad(buf.len() - boundary_from) + boundary_from;
    buf.resize(padded, 0);
}

fn flags_byte(temptype: TempType, interp: Interpolation, has_z: bool) -> u8 {
    let mut flags = FLAG_X | FLAG_T;
    if temptype.is_continuous() {
        flags |= FLAG_CONTINUOUS;
    }
    let interp_bits = match interp {
        Interpolation::Discrete => 0u8,
        Interpolation::Step => 1,
        Interpolation::Linear => 2,
    };
    flags |= interp_bits << FLAG_INTERP_SHIFT;
    if has_z {
        flags |= FLAG_Z;
    }
    if temptype == TempType::GeogPoint {
        flags |= FLAG_GEODETIC;
    }
    flags
}

fn temptype_byte(temptype: TempType) -> u8 {
    match temptype {
        TempType::Bool => 1,
        TempType::Int => 2,
        TempType::Float => 3,
        TempType::Text => 4,
        TempType::GeomPoint => 5,
        TempType::GeogPoint => 6,
    }
}

fn temptype_from_byte(b: u8, pos: usize) -> Result<TempType> {
    match b {
        1 => Ok(TempType::Bool),
        2 => Ok(TempType::Int),
        3 => Ok(TempType::Float),
        4 => Ok(TempType::Text),
        5 => Ok(TempType::GeomPoint),
        6 => Ok(TempType::GeogPoint),
        _ => Err(TemporalError::parse(pos, format!("unknown temporal type {b}"))),
    }
}

fn interp_from_flags(flags: u8, pos: usize) -> Result<Interpolation> {
    match (flags & FLAG_INTERP_MASK) >> FLAG_INTERP_SHIFT {
        0 => Ok(Interpolation::Discrete),
        1 => Ok(Interpolation::Step),
        2 => Ok(Interpolation::Linear),
        b => Err(TemporalError::parse(pos, format!("unknown interpolation {b}"))),
    }
}

/// Size of the encoded value-extent part of a bounding box.
fn bbox_extra_size(temptype: TempType) -> usize {
    if temptype.is_number() {
        16
    } else if temptype.is_point() {
        56
    } else {
        0
    }
}

// ----------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------

/// Serialise a sequence set into its packed byte form.
pub fn encode_seqset(ss: &TSequenceSet) -> Bytes {
    let temptype = ss.temptype();
    let count = ss.num_sequences();
    let encoded: Vec<Bytes> = ss.sequences().iter().map(encode_sequence).collect();

    let mut buf = BytesMut::with_capacity(
        64 + count * 8 + encoded.iter().map(|b| double_pad(b.len())).sum::<usize>(),
    );
    buf.put_u32_le(0); // varsize, patched below
    buf.put_u32_le(count as u32);
    buf.put_u32_le(count as u32); // maxcount; reserved slots collapse on encode
    buf.put_u32_le(ss.total_instants() as u32);
    buf.put_u8(temptype_byte(temptype));
    buf.put_u8(SUBTYPE_SEQUENCESET);
    buf.put_u8(flags_byte(temptype, ss.interpolation(), bbox_has_z(ss)));
    buf.put_u8((24 + bbox_extra_size(temptype)) as u8);
    pad_to(&mut buf, 0);

    put_bbox(&mut buf, ss);
    pad_to(&mut buf, 0);

    let offsets_at = buf.len();
    for _ in 0..count {
        buf.put_u64_le(0); // patched below
    }
    let data_start = buf.len();
    let mut offsets = Vec::with_capacity(count);
    for bytes in &encoded {
        offsets.push((buf.len() - data_start) as u64);
        buf.extend_from_slice(bytes);
        pad_to(&mut buf, data_start);
    }
    for (i, off) in offsets.iter().enumerate() {
        let at = offsets_at + i * 8;
        buf[at..at + 8].copy_from_slice(&off.to_le_bytes());
    }
    let varsize = buf.len() as u32;
    buf[0..4].copy_from_slice(&varsize.to_le_bytes());
    buf.freeze()
}

fn bbox_has_z(ss: &TSequenceSet) -> bool {
    ss.bbox()
        .extent
        .is_some_and(|e| e.min_z.is_some() && e.max_z.is_some())
}

fn put_bbox(buf: &mut BytesMut, ss: &TSequenceSet) {
    let period = ss.period();
    put_period(buf, &period);
    if let Some((lo, hi)) = ss.bbox().span {
        buf.put_f64_le(lo);
        buf.put_f64_le(hi);
    } else if let Some(extent) = ss.bbox().extent {
        buf.put_u8(u8::from(extent.min_z.is_some()));
        buf.put_bytes(0, 7);
        buf.put_f64_le(extent.min_x);
        buf.put_f64_le(extent.min_y);
        buf.put_f64_le(extent.min_z.unwrap_or(0.0));
        buf.put_f64_le(extent.max_x);
        buf.put_f64_le(extent.max_y);
        buf.put_f64_le(extent.max_z.unwrap_or(0.0));
    }
}

fn put_period(buf: &mut BytesMut, p: &Period) {
    buf.put_i64_le(p.lower.micros());
    buf.put_i64_le(p.upper.micros());
    buf.put_u8(u8::from(p.lower_inc));
    buf.put_u8(u8::from(p.upper_inc));
    buf.put_bytes(0, 6);
}

fn encode_sequence(seq: &TSequence) -> Bytes {
    let temptype = seq.temptype();
    let mut buf = BytesMut::with_capacity(64 + seq.num_instants() * 24);
    buf.put_u32_le(0); // varsize, patched below
    buf.put_u32_le(seq.num_instants() as u32);
    buf.put_u8(temptype_byte(temptype));
    buf.put_u8(SUBTYPE_SEQUENCE);
    let has_z = seq
        .instants()
        .iter()
        .any(|i| matches!(&i.value, Value::Point(p) if p.is_3d()));
    buf.put_u8(flags_byte(temptype, seq.interpolation(), has_z));
    // A sequence stores only the period part of its box; the value extent is
    // recomputed from the instants on decode.
    buf.put_u8(24);
    pad_to(&mut buf, 0);
    put_period(&mut buf, seq.period());
    for inst in seq.instants() {
        buf.put_i64_le(inst.t.micros());
        put_value(&mut buf, &inst.value);
        pad_to(&mut buf, 0);
    }
    let varsize = buf.len() as u32;
    buf[0..4].copy_from_slice(&varsize.to_le_bytes());
    buf.freeze()
}

fn put_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Bool(b) => buf.put_u8(u8::from(*b)),
        Value::Int(i) => buf.put_i64_le(*i),
        Value::Float(f) => buf.put_f64_le(*f),
        Value::Text(s) => {
            buf.put_u32_le(s.len() as u32);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Point(p) => {
            buf.put_u8(u8::from(p.is_3d()));
            buf.put_u8(u8::from(p.geodetic));
            buf.put_bytes(0, 2);
            buf.put_i32_le(p.srid);
            buf.put_f64_le(p.x());
            buf.put_f64_le(p.y());
            if let Some(z) = p.z {
                buf.put_f64_le(z);
            }
        }
    }
}

// ----------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(TemporalError::parse(self.pos, "buffer truncated"));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn skip_pad(&mut self) -> Result<()> {
        let target = double_pad(self.pos);
        if target > self.buf.len() {
            return Err(TemporalError::parse(self.pos, "buffer truncated"));
        }
        self.pos = target;
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().expect("length checked")))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("length checked")))
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes(b.try_into().expect("length checked")))
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().expect("length checked")))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    fn period(&mut self) -> Result<Period> {
        let lower = Timestamp::from_micros(self.i64()?);
        let upper = Timestamp::from_micros(self.i64()?);
        let lower_inc = self.u8()? != 0;
        let upper_inc = self.u8()? != 0;
        self.take(6)?;
        Period::new(lower, upper, lower_inc, upper_inc)
            .map_err(|reason| TemporalError::parse(self.pos, reason))
    }
}

/// Rebuild a sequence set from its packed byte form, validating as it goes.
pub fn decode_seqset(buf: &[u8]) -> Result<TSequenceSet> {
    let mut r = Reader::new(buf);
    let varsize = r.u32()? as usize;
    if varsize != buf.len() {
        return Err(TemporalError::parse(
            0,
            format!("varsize {varsize} does not match buffer length {}", buf.len()),
        ));
    }
    let count = r.u32()? as usize;
    let maxcount = r.u32()? as usize;
    let total_instants = r.u32()? as usize;
    if count == 0 || maxcount < count {
        return Err(TemporalError::parse(4, "invalid sequence counts"));
    }
    let temptype = temptype_from_byte(r.u8()?, r.pos)?;
    let subtype = r.u8()?;
    if subtype != SUBTYPE_SEQUENCESET {
        return Err(TemporalError::parse(r.pos, "not a sequence set"));
    }
    let flags = r.u8()?;
    let interp = interp_from_flags(flags, r.pos)?;
    let bboxsize = r.u8()? as usize;
    if bboxsize != 24 + bbox_extra_size(temptype) {
        return Err(TemporalError::parse(r.pos, "bounding box size mismatch"));
    }
    r.skip_pad()?;
    // The bbox is recomputed from the children; skip its bytes.
    r.take(bboxsize)?;
    r.skip_pad()?;

    let mut offsets = Vec::with_capacity(maxcount);
    for _ in 0..maxcount {
        offsets.push(r.u64()? as usize);
    }
    let data_start = r.pos;
    let mut sequences = Vec::with_capacity(count);
    for &off in offsets.iter().take(count) {
        let at = data_start + off;
        if at >= buf.len() {
            return Err(TemporalError::parse(at, "sequence offset out of range"));
        }
        sequences.push(decode_sequence(&buf[at..], temptype, interp, at)?);
    }
    let ss = TSequenceSet::make(sequences, false)?;
    if ss.total_instants() != total_instants {
        return Err(TemporalError::parse(
            12,
            format!(
                "instant count mismatch: header says {total_instants}, decoded {}",
                ss.total_instants()
            ),
        ));
    }
    log::debug!(
        "decoded sequence set: {count} sequences, {total_instants} instants"
    );
    Ok(ss)
}

fn decode_sequence(
    buf: &[u8],
    temptype: TempType,
    interp: Interpolation,
    base: usize,
) -> Result<TSequence> {
    let mut r = Reader::new(buf);
    let varsize = r.u32()? as usize;
    if varsize > buf.len() {
        return Err(TemporalError::parse(base, "sequence extends past buffer"));
    }
    let count = r.u32()? as usize;
    if count == 0 {
        return Err(TemporalError::parse(base + 4, "empty sequence"));
    }
    let seq_temptype = temptype_from_byte(r.u8()?, base + r.pos)?;
    if seq_temptype != temptype {
        return Err(TemporalError::TypeMismatch);
    }
    let subtype = r.u8()?;
    if subtype != SUBTYPE_SEQUENCE {
        return Err(TemporalError::parse(base + r.pos, "not a sequence"));
    }
    let flags = r.u8()?;
    let seq_interp = interp_from_flags(flags, base + r.pos)?;
    if seq_interp != interp {
        return Err(TemporalError::InterpolationMismatch);
    }
    let _bboxsize = r.u8()?;
    r.skip_pad()?;
    let period = r.period()?;
    let mut instants = Vec::with_capacity(count);
    for _ in 0..count {
        let t = Timestamp::from_micros(r.i64()?);
        let value = take_value(&mut r, temptype, base)?;
        r.skip_pad()?;
        instants.push(TInstant::new(t, value));
    }
    TSequence::new(instants, period.lower_inc, period.upper_inc, interp, false)
}

fn take_value(r: &mut Reader<'_>, temptype: TempType, base: usize) -> Result<Value> {
    match temptype {
        TempType::Bool => Ok(Value::Bool(r.u8()? != 0)),
        TempType::Int => Ok(Value::Int(r.i64()?)),
        TempType::Float => Ok(Value::Float(r.f64()?)),
        TempType::Text => {
            let len = r.u32()? as usize;
            let bytes = r.take(len)?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| TemporalError::parse(base + r.pos, "invalid utf-8 text"))?;
            Ok(Value::Text(s.to_string()))
        }
        TempType::GeomPoint | TempType::GeogPoint => {
            let has_z = r.u8()? != 0;
            let geodetic = r.u8()? != 0;
            r.take(2)?;
            let srid = r.i32()?;
            let x = r.f64()?;
            let y = r.f64()?;
            let mut point = if has_z {
                let z = r.f64()?;
                PointValue::new_3d(x, y, z)
            } else {
                PointValue::new(x, y)
            };
            point.srid = srid;
            point.geodetic = geodetic;
            Ok(Value::Point(point))
        }
    }
}
