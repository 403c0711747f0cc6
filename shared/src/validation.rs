use std::collections::HashSet;
use time::OffsetDateTime;
use uuid::Uuid;
use crate::models::SubmitBookRequest;

pub const MAX_TITLE_LENGTH: usize = 300;
pub const MAX_AUTHOR_LENGTH: usize = 200;
pub const MAX_BOOK_ID_LENGTH: usize = 128;
pub const MAX_COMMENT_LENGTH: usize = 500;
pub const DEFAULT_MAX_SUBMISSIONS_PER_USER: usize = 2;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Book title is required")]
    EmptyTitle,
    #[error("Title exceeds maximum length of {MAX_TITLE_LENGTH}")]
    TitleTooLong,
    #[error("Book author is required")]
    EmptyAuthor,
    #[error("Author exceeds maximum length of {MAX_AUTHOR_LENGTH}")]
    AuthorTooLong,
    #[error("Book id is required")]
    EmptyBookId,
    #[error("Book id exceeds maximum length of {MAX_BOOK_ID_LENGTH}")]
    BookIdTooLong,
    #[error("Comment exceeds maximum length of {MAX_COMMENT_LENGTH}")]
    CommentTooLong,
    #[error("Closing time must be in the future")]
    ClosesInPast,
    #[error("Ballot must rank at least one submission")]
    EmptyRankings,
    #[error("Submission ranked more than once: {0}")]
    DuplicateRanking(Uuid),
    #[error("Unknown submission: {0}")]
    UnknownSubmission(Uuid),
}

pub fn validate_submission_request(request: &SubmitBookRequest) -> Result<(), ValidationError> {
    let details = &request.book_details;
    if request.book_id.trim().is_empty() { return Err(ValidationError::EmptyBookId); }
    if request.book_id.len() > MAX_BOOK_ID_LENGTH { return Err(ValidationError::BookIdTooLong); }
    if details.title.trim().is_empty() { return Err(ValidationError::EmptyTitle); }
    if details.title.chars().count() > MAX_TITLE_LENGTH { return Err(ValidationError::TitleTooLong); }
    if details.author.trim().is_empty() { return Err(ValidationError::EmptyAuthor); }
    if details.author.chars().count() > MAX_AUTHOR_LENGTH { return Err(ValidationError::AuthorTooLong); }

    if let Some(comment) = &request.comment {
        if comment.chars().count() > MAX_COMMENT_LENGTH { return Err(ValidationError::CommentTooLong); }
    }

    Ok(())
}

pub fn validate_closes_at(closes_at: OffsetDateTime, now: OffsetDateTime) -> Result<(), ValidationError> {
    if closes_at <= now {
        return Err(ValidationError::ClosesInPast);
    }
    Ok(())
}

/// Rankings may be partial but must be non-empty, free of repeats, and only
/// name submissions of the poll.
pub fn validate_rankings(rankings: &[Uuid], submission_ids: &[Uuid]) -> Result<(), ValidationError> {
    if rankings.is_empty() {
        return Err(ValidationError::EmptyRankings);
    }

    let mut seen = HashSet::with_capacity(rankings.len());
    if let Some(dup) = rankings.iter().find(|id| !seen.insert(**id)) {
        return Err(ValidationError::DuplicateRanking(*dup));
    }

    if let Some(unknown) = rankings.iter().find(|id| !submission_ids.contains(id)) {
        return Err(ValidationError::UnknownSubmission(*unknown));
    }

    Ok(())
}

/// Trims the optional comment, dropping it when blank.
pub fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
