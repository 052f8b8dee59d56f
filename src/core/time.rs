use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

/// Worksheet timestamps are stored as naive UTC.
pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    let utc = value.assume_utc();
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn completed_at_renders_as_rfc3339_utc() {
        assert_eq!(format_primitive(datetime!(2024-09-03 08:15:00)), "2024-09-03T08:15:00Z");
    }

    #[test]
    fn now_has_no_offset_drift() {
        let before = OffsetDateTime::now_utc();
        let now = primitive_now_utc().assume_utc();
        assert!(now >= before);
        assert!(now - before < time::Duration::seconds(5));
    }
}
