//! Sort enumerations shared by the comment and post listings.
//!
//! Parsing never fails: an unknown field sorts by `created_at` and an
//! unknown direction sorts descending.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSortField {
    Id,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl CommentSortField {
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "id" => Self::Id,
            "updated_at" => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSortField {
    Id,
    #[default]
    CreatedAt,
    Title,
}

impl PostSortField {
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "id" => Self::Id,
            "title" => Self::Title,
            _ => Self::CreatedAt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CreatedAt => "created_at",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sort_field_falls_back_to_created_at() {
        assert_eq!(CommentSortField::parse_lenient("id"), CommentSortField::Id);
        assert_eq!(
            CommentSortField::parse_lenient("updated_at"),
            CommentSortField::UpdatedAt
        );
        assert_eq!(
            CommentSortField::parse_lenient("content; DROP TABLE comments"),
            CommentSortField::CreatedAt
        );
        assert_eq!(PostSortField::parse_lenient(""), PostSortField::CreatedAt);
        assert_eq!(PostSortField::parse_lenient("title"), PostSortField::Title);
    }

    #[test]
    fn unknown_direction_falls_back_to_desc() {
        assert_eq!(SortDirection::parse_lenient("asc"), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient("ASC"), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient("sideways"), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient(""), SortDirection::Desc);
    }
}
