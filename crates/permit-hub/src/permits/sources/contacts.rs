use super::RawRow;
use crate::permits::normalizer;

/// Portals never publish more than this many contact slots per permit.
pub const MAX_CONTACT_SLOTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub kind: String,
    pub name: String,
}

impl Contact {
    fn kind_upper(&self) -> String {
        self.kind.trim().to_ascii_uppercase()
    }
}

/// Ordered `(type, name)` pairs read from `contact_N_type` / `contact_N_name` columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSlots {
    contacts: Vec<Contact>,
}

impl ContactSlots {
    pub fn from_row(row: &RawRow, slots: usize) -> Self {
        let mut contacts = Vec::new();
        for slot in 1..=slots.min(MAX_CONTACT_SLOTS) {
            let kind = normalizer::text(row.get(&format!("contact_{slot}_type")));
            let name = normalizer::text(row.get(&format!("contact_{slot}_name")));
            if let (Some(kind), Some(name)) = (kind, name) {
                contacts.push(Contact { kind, name });
            }
        }
        Self { contacts }
    }

    pub fn from_pairs<I, K, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        N: Into<String>,
    {
        let contacts = pairs
            .into_iter()
            .take(MAX_CONTACT_SLOTS)
            .map(|(kind, name)| Contact {
                kind: kind.into(),
                name: name.into(),
            })
            .collect();
        Self { contacts }
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn find<P>(&self, predicate: P) -> Option<&Contact>
    where
        P: Fn(&Contact) -> bool,
    {
        self.contacts.iter().find(|contact| predicate(contact))
    }

    /// First contact whose type mentions the fragment, case-insensitively.
    pub fn named(&self, kind_fragment: &str) -> Option<&Contact> {
        let fragment = kind_fragment.to_ascii_uppercase();
        self.find(|contact| contact.kind_upper().contains(&fragment))
    }

    /// First contractor-typed contact, unless an exact general contractor shows up later.
    pub fn contractor(&self) -> Option<&Contact> {
        let mut first = None;
        for contact in &self.contacts {
            let kind = contact.kind_upper();
            if kind == "GENERAL CONTRACTOR" {
                return Some(contact);
            }
            if first.is_none() && kind.contains("CONTRACTOR") {
                first = Some(contact);
            }
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> RawRow {
        value.as_object().cloned().expect("object row")
    }

    #[test]
    fn general_contractor_wins_over_earlier_contractor() {
        let slots = ContactSlots::from_pairs([
            ("OWNER", "Lakeshore Holdings"),
            ("CONTRACTOR-ELECTRICAL", "Spark Co"),
            ("General Contractor", "Skyline Construction"),
        ]);
        assert_eq!(
            slots.contractor().map(|c| c.name.as_str()),
            Some("Skyline Construction")
        );
    }

    #[test]
    fn first_contractor_is_used_without_general_match() {
        let slots = ContactSlots::from_pairs([
            ("ARCHITECT", "Design Studio 4"),
            ("CONTRACTOR-PLUMBING", "Pipe Pros"),
            ("CONTRACTOR-ELECTRICAL", "Spark Co"),
        ]);
        assert_eq!(slots.contractor().map(|c| c.name.as_str()), Some("Pipe Pros"));
        assert_eq!(
            slots.named("architect").map(|c| c.name.as_str()),
            Some("Design Studio 4")
        );
        assert!(slots.named("OWNER").is_none());
    }

    #[test]
    fn from_row_scans_bounded_slots_and_skips_gaps() {
        let raw = row(json!({
            "contact_1_type": "OWNER",
            "contact_1_name": "Lakeshore Holdings",
            "contact_2_type": "CONTRACTOR-GENERAL CONTRACTOR",
            "contact_2_name": "",
            "contact_3_type": "EXPEDITOR",
            "contact_3_name": "Fast Permits",
            "contact_6_type": "GENERAL CONTRACTOR",
            "contact_6_name": "Out Of Range Builders",
        }));

        let slots = ContactSlots::from_row(&raw, 10);
        assert_eq!(
            slots.named("owner").map(|c| c.name.as_str()),
            Some("Lakeshore Holdings")
        );
        assert!(slots.contractor().is_none());
        assert!(ContactSlots::from_row(&raw, 0).is_empty());
    }
}
