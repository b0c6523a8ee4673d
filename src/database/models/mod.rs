pub mod admin_user;
pub mod bible;
pub mod book;
pub mod chapter;
pub mod verse;

pub use admin_user::{AdminUser, ADMIN_ROLE};
pub use bible::{Bible, BibleBook, BibleChapter, BibleVerse, RecentUpdate};
pub use book::{Book, BookDraft};
pub use chapter::{Chapter, ChapterDraft};
pub use verse::{Verse, VerseDraft};
