//! Well-Known Text form of temporal values.
//!
//! Grammar: an instant is `value@timestamp`; a discrete sequence wraps
//! instants in `{…}`; a continuous sequence wraps them in `[…]` / `(…)` with
//! the bracket choice encoding bound inclusivity; a sequence set wraps
//! continuous sequences in `{…}`. A leading `SRID=n;` tags point values and
//! a leading `Interp=Stepwise;` forces step interpolation on continuous base
//! types.

use crate::error::{Result, TemporalError};
use crate::inst::TInstant;
use crate::seq::TSequence;
use crate::seqset::TSequenceSet;
use crate::temporal::Temporal;
use std::fmt::Write as _;
use tempo_types::time::Timestamp;
use tempo_types::value::{Interpolation, PointValue, TempType, Value};

/// Parse the WKT form of a temporal value of the given type.
pub fn parse_temporal(input: &str, temptype: TempType) -> Result<Temporal> {
    let mut parser = Parser::new(input, temptype);
    let temp = parser.parse()?;
    parser.skip_ws();
    if !parser.done() {
        return Err(TemporalError::parse(parser.pos, "trailing input"));
    }
    Ok(temp)
}

/// Format a temporal value as WKT, including the `SRID=`/`Interp=` prefixes.
pub fn format_temporal(temp: &Temporal) -> String {
    let mut out = String::new();
    if let Some(srid) = point_srid(temp) {
        if srid != 0 {
            let _ = write!(out, "SRID={srid};");
        }
    }
    if temp.temptype().is_continuous() && temp.interpolation() == Some(Interpolation::Step) {
        out.push_str("Interp=Stepwise;");
    }
    let _ = write!(out, "{temp}");
    out
}

fn point_srid(temp: &Temporal) -> Option<i32> {
    let first = match temp {
        Temporal::Instant(inst) => inst,
        Temporal::Sequence(seq) => seq.first(),
        Temporal::SequenceSet(ss) => ss.sequences()[0].first(),
    };
    match &first.value {
        Value::Point(p) => Some(p.srid),
        _ => None,
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    temptype: TempType,
    srid: i32,
    interp: Interpolation,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, temptype: TempType) -> Self {
        Parser {
            input,
            pos: 0,
            temptype,
            srid: 0,
            interp: temptype.default_interpolation(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn done(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(TemporalError::parse(self.pos, format!("expected {c:?}")))
        }
    }

    fn eat(&mut self, prefix: &str) -> bool {
        let rest = self.rest().as_bytes();
        if rest.len() >= prefix.len()
            && rest[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn parse(&mut self) -> Result<Temporal> {
        self.skip_ws();
        if self.eat("SRID=") {
            self.srid = self.parse_int()? as i32;
            self.expect(';')?;
            self.skip_ws();
        }
        if self.eat("Interp=Stepwise;") {
            if !self.temptype.is_continuous() {
                return Err(TemporalError::parse(
                    self.pos,
                    "step interpolation prefix on a step-only type",
                ));
            }
            self.interp = Interpolation::Step;
            self.skip_ws();
        }
        match self.peek() {
            Some('{') => {
                // A set of sequences or a discrete sequence, told apart by
                // the first element's opening character.
                let mark = self.pos;
                self.bump();
                self.skip_ws();
                let set = matches!(self.peek(), Some('[') | Some('('));
                self.pos = mark;
                if set {
                    self.parse_seqset().map(Temporal::SequenceSet)
                } else {
                    self.parse_discrete().map(Temporal::Sequence)
                }
            }
            Some('[') | Some('(') => self.parse_cont_seq().map(Temporal::Sequence),
            Some(_) => self.parse_instant().map(Temporal::Instant),
            None => Err(TemporalError::parse(self.pos, "empty input")),
        }
    }

    fn parse_seqset(&mut self) -> Result<TSequenceSet> {
        self.expect('{')?;
        let mut sequences = Vec::new();
        loop {
            sequences.push(self.parse_cont_seq()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                _ => return Err(TemporalError::parse(self.pos, "expected ',' or '}'")),
            }
        }
        TSequenceSet::make(sequences, true)
    }

    fn parse_discrete(&mut self) -> Result<TSequence> {
        self.expect('{')?;
        let mut instants = Vec::new();
        loop {
            self.skip_ws();
            instants.push(self.parse_instant()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                _ => return Err(TemporalError::parse(self.pos, "expected ',' or '}'")),
            }
        }
        TSequence::discrete(instants)
    }

    fn parse_cont_seq(&mut self) -> Result<TSequence> {
        self.skip_ws();
        let lower_inc = match self.bump() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(TemporalError::parse(self.pos, "expected '[' or '('")),
        };
        let mut instants = Vec::new();
        let upper_inc;
        loop {
            self.skip_ws();
            instants.push(self.parse_instant()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => {
                    upper_inc = true;
                    break;
                }
                Some(')') => {
                    upper_inc = false;
                    break;
                }
                _ => return Err(TemporalError::parse(self.pos, "expected ',', ']' or ')'")),
            }
        }
        TSequence::new(instants, lower_inc, upper_inc, self.interp, true)
    }

    fn parse_instant(&mut self) -> Result<TInstant> {
        let value = self.parse_value()?;
        self.expect('@')?;
        let t = self.parse_timestamp()?;
        Ok(TInstant::new(t, value))
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.temptype {
            TempType::Bool => {
                if self.eat("true") || self.eat("t") {
                    Ok(Value::Bool(true))
                } else if self.eat("false") || self.eat("f") {
                    Ok(Value::Bool(false))
                } else {
                    Err(TemporalError::parse(self.pos, "expected boolean"))
                }
            }
            TempType::Int => Ok(Value::Int(self.parse_int()?)),
            TempType::Float => Ok(Value::Float(self.parse_float()?)),
            TempType::Text => self.parse_text(),
            TempType::GeomPoint | TempType::GeogPoint => self.parse_point(),
        }
    }

    fn parse_int(&mut self) -> Result<i64> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| TemporalError::parse(start, "expected integer"))
    }

    fn parse_float(&mut self) -> Result<f64> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E')
        {
            if matches!(self.peek(), Some('e') | Some('E')) {
                self.bump();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
            } else {
                self.bump();
            }
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| TemporalError::parse(start, "expected float"))
    }

    fn parse_text(&mut self) -> Result<Value> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(TemporalError::parse(self.pos, "unterminated escape")),
                },
                Some('"') => return Ok(Value::Text(out)),
                Some(c) => out.push(c),
                None => return Err(TemporalError::parse(self.pos, "unterminated string")),
            }
        }
    }

    fn parse_point(&mut self) -> Result<Value> {
        if !self.eat("POINT") {
            return Err(TemporalError::parse(self.pos, "expected POINT"));
        }
        self.skip_ws();
        let has_z_tag = self.eat("Z") || self.eat("z");
        self.expect('(')?;
        self.skip_ws();
        let x = self.parse_float()?;
        self.skip_ws();
        let y = self.parse_float()?;
        self.skip_ws();
        let z = if self.peek() != Some(')') {
            Some(self.parse_float()?)
        } else {
            None
        };
        if has_z_tag && z.is_none() {
            return Err(TemporalError::parse(self.pos, "POINT Z needs a z value"));
        }
        self.expect(')')?;
        let mut point = match z {
            Some(z) => PointValue::new_3d(x, y, z),
            None => PointValue::new(x, y),
        };
        point.srid = self.srid;
        point.geodetic = self.temptype == TempType::GeogPoint;
        Ok(Value::Point(point))
    }

    fn parse_timestamp(&mut self) -> Result<Timestamp> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !matches!(c, ',' | ']' | ')' | '}'))
        {
            self.bump();
        }
        let text = self.input[start..self.pos].trim_end();
        text.parse()
            .map_err(|reason: String| TemporalError::parse(start, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::Subtype;

    fn roundtrip(input: &str, temptype: TempType) -> String {
        let temp = parse_temporal(input, temptype).unwrap();
        format_temporal(&temp)
    }

    #[test]
    fn test_parse_instant() {
        let temp = parse_temporal("1@2000-01-01", TempType::Int).unwrap();
        assert_eq!(temp.subtype(), Subtype::Instant);
        assert_eq!(
            temp.value_at(Timestamp::from_ymd(2000, 1, 1), true),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn test_parse_seqset_roundtrip_stable() {
        // Parse-then-format is stable on the normalised form.
        let input =
            "{[1@2000-01-01, 2@2000-01-02), [3@2000-01-03, 3@2000-01-04]}";
        let once = roundtrip(input, TempType::Float);
        let twice = roundtrip(&once, TempType::Float);
        assert_eq!(once, twice);
        assert_eq!(
            once,
            "{[1@2000-01-01 00:00:00+00, 2@2000-01-02 00:00:00+00), \
             [3@2000-01-03 00:00:00+00, 3@2000-01-04 00:00:00+00]}"
        );
    }

    #[test]
    fn test_parse_discrete_sequence() {
        let temp = parse_temporal("{1@2000-01-01, 2@2000-01-02}", TempType::Int).unwrap();
        assert_eq!(temp.subtype(), Subtype::DiscreteSequence);
        assert_eq!(temp.num_instants(), 2);
    }

    #[test]
    fn test_interp_prefix() {
        let temp = parse_temporal(
            "Interp=Stepwise;[1.5@2000-01-01, 2.5@2000-01-02]",
            TempType::Float,
        )
        .unwrap();
        assert_eq!(temp.interpolation(), Some(Interpolation::Step));
        let formatted = format_temporal(&temp);
        assert!(formatted.starts_with("Interp=Stepwise;["));

        // Default for floats is linear, no prefix.
        let linear = parse_temporal("[1.5@2000-01-01, 2.5@2000-01-02]", TempType::Float).unwrap();
        assert_eq!(linear.interpolation(), Some(Interpolation::Linear));
        assert!(!format_temporal(&linear).contains("Interp"));
    }

    #[test]
    fn test_interp_prefix_rejected_for_int() {
        let err =
            parse_temporal("Interp=Stepwise;[1@2000-01-01]", TempType::Int).unwrap_err();
        assert!(matches!(err, TemporalError::ParseError { .. }));
    }

    #[test]
    fn test_srid_prefix_roundtrip() {
        let input = "SRID=4326;[POINT(1 2)@2000-01-01, POINT(3 4)@2000-01-02)";
        let temp = parse_temporal(input, TempType::GeogPoint).unwrap();
        let formatted = format_temporal(&temp);
        assert!(formatted.starts_with("SRID=4326;["));
        let again = parse_temporal(&formatted, TempType::GeogPoint).unwrap();
        assert_eq!(temp, again);
    }

    #[test]
    fn test_point_z() {
        let temp = parse_temporal("POINT Z (1 2 3)@2000-01-01", TempType::GeomPoint).unwrap();
        match temp.values().pop().unwrap() {
            Value::Point(p) => assert_eq!(p.z, Some(3.0)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_text_escaping() {
        let temp = parse_temporal("\"say \\\"hi\\\"\"@2000-01-01", TempType::Text).unwrap();
        let formatted = format_temporal(&temp);
        let again = parse_temporal(&formatted, TempType::Text).unwrap();
        assert_eq!(temp, again);
    }

    #[test]
    fn test_bool_roundtrip() {
        let temp = parse_temporal("{[t@2000-01-01, f@2000-01-02]}", TempType::Bool).unwrap();
        assert_eq!(temp.subtype(), Subtype::SequenceSet);
        let formatted = format_temporal(&temp);
        let again = parse_temporal(&formatted, TempType::Bool).unwrap();
        assert_eq!(temp, again);
    }

    #[test]
    fn test_parse_error_carries_position() {
        let err = parse_temporal("[1@2000-01-01, oops]", TempType::Int).unwrap_err();
        match err {
            TemporalError::ParseError { pos, .. } => assert!(pos > 0),
            _ => unreachable!(),
        }
        assert!(parse_temporal("", TempType::Int).is_err());
        assert!(parse_temporal("[1@2000-01-01", TempType::Int).is_err());
    }

    #[test]
    fn test_normalisation_on_parse() {
        // Touching joinable sequences coalesce when parsed.
        let temp = parse_temporal(
            "{[1@2000-01-01, 2@2000-01-02), [2@2000-01-02, 3@2000-01-03)}",
            TempType::Float,
        )
        .unwrap();
        match temp {
            Temporal::SequenceSet(ref ss) => assert_eq!(ss.num_sequences(), 1),
            _ => unreachable!(),
        }
    }
}
