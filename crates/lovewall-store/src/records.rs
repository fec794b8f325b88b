//! Message and album collections.
//!
//! Every mutation is a read-modify-write of a whole file.  The store-wide
//! `write_lock` is held across that cycle so two requests in the same process
//! cannot overwrite each other's changes.  Album entries are addressed by
//! their zero-based position in the current listing.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::collection::JsonCollection;
use crate::error::{Result, StoreError};
use crate::images::ImageStore;
use crate::models::{
    now_display, AlbumEntry, LoveMessage, NewLoveMessage, ALBUM_DATA_FILE, LOVE_DATA_FILE,
};

pub struct RecordStore {
    data_dir: PathBuf,
    messages: JsonCollection<LoveMessage>,
    album: JsonCollection<AlbumEntry>,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Open the store rooted at `data_dir`, creating the directory and both
    /// data files if they do not exist yet.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| StoreError::write(&data_dir, e))?;

        let messages = JsonCollection::new(data_dir.join(LOVE_DATA_FILE));
        let album = JsonCollection::new(data_dir.join(ALBUM_DATA_FILE));
        messages.ensure_exists().await?;
        album.ensure_exists().await?;

        info!(
            messages = %messages.path().display(),
            album = %album.path().display(),
            "Record store opened"
        );

        Ok(Self {
            data_dir,
            messages,
            album,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// All messages, oldest first.
    pub async fn list_messages(&self) -> Result<Vec<LoveMessage>> {
        self.messages.load().await
    }

    pub async fn message_count(&self) -> Result<usize> {
        Ok(self.messages.load().await?.len())
    }

    /// Validate `new`, fill in its defaults and append it to the wall.
    pub async fn append_message(&self, new: NewLoveMessage) -> Result<LoveMessage> {
        let message = new.resolve(now_display)?;

        let _guard = self.write_lock.lock().await;
        let mut messages = self.messages.load().await?;
        messages.push(message.clone());
        self.messages.save(&messages).await?;

        debug!(name = %message.name, total = messages.len(), "Appended message");
        Ok(message)
    }

    // ------------------------------------------------------------------
    // Album
    // ------------------------------------------------------------------

    /// All album entries in upload order.
    pub async fn list_album(&self) -> Result<Vec<AlbumEntry>> {
        self.album.load().await
    }

    pub async fn album_count(&self) -> Result<usize> {
        Ok(self.album.load().await?.len())
    }

    pub async fn append_album_entry(&self, entry: AlbumEntry) -> Result<AlbumEntry> {
        let _guard = self.write_lock.lock().await;
        let mut album = self.album.load().await?;
        album.push(entry.clone());
        self.album.save(&album).await?;

        debug!(filename = %entry.filename, total = album.len(), "Appended album entry");
        Ok(entry)
    }

    /// Remove the entry at `position` and then its stored image.
    ///
    /// Entries after `position` shift down by one.  Failing to delete the
    /// image file is logged and does not fail the call: the record is
    /// already gone by then.
    pub async fn delete_album_entry(
        &self,
        position: i64,
        images: &ImageStore,
    ) -> Result<AlbumEntry> {
        let removed = {
            let _guard = self.write_lock.lock().await;
            let mut album = self.album.load().await?;

            let index = usize::try_from(position)
                .ok()
                .filter(|&i| i < album.len())
                .ok_or(StoreError::NotFound {
                    position,
                    len: album.len(),
                })?;

            let removed = album.remove(index);
            self.album.save(&album).await?;
            debug!(position, filename = %removed.filename, remaining = album.len(), "Removed album entry");
            removed
        };

        if let Err(e) = images.remove(&removed.filename).await {
            warn!(
                filename = %removed.filename,
                error = %e,
                "Album entry removed but its image could not be deleted"
            );
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::ANONYMOUS_NAME;
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    struct Fixture {
        records: RecordStore,
        images: ImageStore,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let records = RecordStore::open(dir.path().join("data")).await.unwrap();
        let images = ImageStore::new(dir.path().join("uploads"), 1024 * 1024)
            .await
            .unwrap();
        Fixture {
            records,
            images,
            _dir: dir,
        }
    }

    fn submission(name: &str, content: &str) -> NewLoveMessage {
        NewLoveMessage {
            name: Some(name.to_string()),
            content: Some(content.to_string()),
            time: None,
            ..Default::default()
        }
    }

    async fn upload(f: &Fixture, name: &str) -> AlbumEntry {
        let entry = f
            .images
            .accept_upload(name.as_bytes(), "image/png", name)
            .await
            .unwrap();
        f.records.append_album_entry(entry).await.unwrap()
    }

    #[tokio::test]
    async fn open_creates_empty_files() {
        let f = fixture().await;
        assert!(f.records.data_dir().join(LOVE_DATA_FILE).exists());
        assert!(f.records.data_dir().join(ALBUM_DATA_FILE).exists());
        assert!(f.records.list_messages().await.unwrap().is_empty());
        assert!(f.records.list_album().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopen_keeps_existing_data() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");

        let first = RecordStore::open(&data_dir).await.unwrap();
        first.append_message(submission("a", "first")).await.unwrap();
        drop(first);

        let second = RecordStore::open(&data_dir).await.unwrap();
        assert_eq!(second.message_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn appended_message_is_last() {
        let f = fixture().await;
        f.records.append_message(submission("a", "one")).await.unwrap();
        let stored = f.records.append_message(submission("b", "two")).await.unwrap();

        let all = f.records.list_messages().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.last(), Some(&stored));
        assert_eq!(all[0].content, "one");
        assert!(!stored.time.is_empty());
    }

    #[tokio::test]
    async fn anonymous_scenario() {
        let f = fixture().await;
        f.records.append_message(submission("", "hi")).await.unwrap();

        let all = f.records.list_messages().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, ANONYMOUS_NAME);
        assert_eq!(all[0].content, "hi");
        assert!(!all[0].time.is_empty());
    }

    #[tokio::test]
    async fn empty_content_leaves_collection_unchanged() {
        let f = fixture().await;
        f.records.append_message(submission("a", "keep")).await.unwrap();
        let before = f.records.list_messages().await.unwrap();

        let result = f.records.append_message(submission("b", "")).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(f.records.list_messages().await.unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let records = Arc::new(RecordStore::open(dir.path()).await.unwrap());

        let mut tasks = JoinSet::new();
        for i in 0..20 {
            let records = records.clone();
            tasks.spawn(async move {
                records
                    .append_message(submission("n", &format!("msg {i}")))
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        assert_eq!(records.message_count().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn upload_adds_one_entry() {
        let f = fixture().await;
        let entry = upload(&f, "cat.png").await;

        let album = f.records.list_album().await.unwrap();
        assert_eq!(album, vec![entry.clone()]);
        assert!(f.images.path_for(&entry.filename).unwrap().exists());
    }

    #[tokio::test]
    async fn delete_first_of_three_shifts_rest() {
        let f = fixture().await;
        let a = upload(&f, "a.png").await;
        let b = upload(&f, "b.png").await;
        let c = upload(&f, "c.png").await;

        let removed = f.records.delete_album_entry(0, &f.images).await.unwrap();
        assert_eq!(removed, a);

        let album = f.records.list_album().await.unwrap();
        assert_eq!(album, vec![b, c]);
        assert!(!f.images.path_for(&a.filename).unwrap().exists());
    }

    #[tokio::test]
    async fn delete_out_of_range_leaves_state() {
        let f = fixture().await;
        let a = upload(&f, "a.png").await;

        for position in [-1, 1, 99] {
            let result = f.records.delete_album_entry(position, &f.images).await;
            assert!(matches!(
                result,
                Err(StoreError::NotFound { len: 1, .. })
            ));
        }

        assert_eq!(f.records.list_album().await.unwrap(), vec![a.clone()]);
        assert!(f.images.path_for(&a.filename).unwrap().exists());
    }

    #[tokio::test]
    async fn delete_succeeds_when_image_already_missing() {
        let f = fixture().await;
        let a = upload(&f, "a.png").await;
        std::fs::remove_file(f.images.path_for(&a.filename).unwrap()).unwrap();

        f.records.delete_album_entry(0, &f.images).await.unwrap();
        assert!(f.records.list_album().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_succeeds_when_image_name_is_unusable() {
        let f = fixture().await;
        // A hand-edited record pointing outside the upload directory.
        let bogus = AlbumEntry::new("../loveData.json".into(), now_display());
        f.records.append_album_entry(bogus).await.unwrap();

        f.records.delete_album_entry(0, &f.images).await.unwrap();
        assert!(f.records.list_album().await.unwrap().is_empty());
        assert!(f.records.data_dir().join(LOVE_DATA_FILE).exists());
    }

    #[tokio::test]
    async fn legacy_messages_survive_a_rewrite() {
        let f = fixture().await;
        let path = f.records.data_dir().join(LOVE_DATA_FILE);
        std::fs::write(
            &path,
            r#"[{"name":null,"content":"hi","time":"t","mood":"x"}]"#,
        )
        .unwrap();

        let all = f.records.list_messages().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, ANONYMOUS_NAME);

        f.records.append_message(submission("b", "later")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["mood"], "x");
        assert_eq!(raw[0]["content"], "hi");
        assert_eq!(raw[1]["content"], "later");
    }

    #[tokio::test]
    async fn failed_save_is_write_error_and_keeps_data() {
        let f = fixture().await;
        f.records.append_message(submission("a", "keep")).await.unwrap();

        // A directory where the temp file should go makes the write fail.
        let tmp = f.records.data_dir().join(format!("{LOVE_DATA_FILE}.tmp"));
        std::fs::create_dir(&tmp).unwrap();

        let result = f.records.append_message(submission("b", "lost")).await;
        assert!(matches!(result, Err(StoreError::StorageWrite { .. })));

        std::fs::remove_dir(&tmp).unwrap();
        let all = f.records.list_messages().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "keep");
    }
}
