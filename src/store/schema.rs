//! Column layout of the output store.

use crate::error::fields;

/// Header written to new stores.
pub const HEADER: [&str; 5] = [
    fields::EXTERNAL_ID,
    fields::TITLE,
    fields::ABSTRACT,
    fields::DOI,
    fields::INCLUSION_FLAG,
];

/// Header of stores produced before ids were index-neutral.
pub const LEGACY_HEADER: [&str; 5] = ["pubmed_id", "title", "abstract", "doi", "final_included"];

/// Which header an existing store carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSchema {
    Current,
    Legacy,
}

impl StoreSchema {
    /// Recognise a header row. Names are compared after trimming and a
    /// leading byte-order mark is ignored.
    pub fn detect<'a>(header: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let names: Vec<&str> = header
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let name = name.trim();
                if i == 0 { name.trim_start_matches('\u{feff}') } else { name }
            })
            .collect();

        if names == HEADER {
            Some(StoreSchema::Current)
        } else if names == LEGACY_HEADER {
            Some(StoreSchema::Legacy)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("external_id,title,abstract,doi,inclusion_flag", Some(StoreSchema::Current))]
    #[case("pubmed_id,title,abstract,doi,final_included", Some(StoreSchema::Legacy))]
    #[case("\u{feff}external_id, title,abstract,doi,inclusion_flag", Some(StoreSchema::Current))]
    #[case("id,title", None)]
    #[case("title,external_id,abstract,doi,inclusion_flag", None)]
    fn test_detect(#[case] header: &str, #[case] expected: Option<StoreSchema>) {
        assert_eq!(StoreSchema::detect(header.split(',')), expected);
    }
}
