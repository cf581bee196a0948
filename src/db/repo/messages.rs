//! YouPin message box.

use super::Repository;
use crate::db::entities::YYYP_MESSAGEBOX;
use crate::db::facade::{InsertOutcome, QueryError};
use crate::db::record::Record;
use serde_json::Value;

impl Repository {
    /// Store one message as posted. Unknown keys (such as `data_from`) are ignored.
    pub async fn insert_message(&self, payload: &Value) -> Result<InsertOutcome, QueryError> {
        let mut record = Record::from_json(&YYYP_MESSAGEBOX, payload);
        self.db.insert_record(&mut record).await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::facade::InsertOutcome;
    use crate::db::repo::test_support::setup_test_repo;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_message_once() {
        let (repo, _tmp) = setup_test_repo().await;
        let msg = json!({
            "message_id": "m-1",
            "title": "出租提醒",
            "templateCode": "T01",
            "imageType": 1,
            "readStatus": "0",
            "message_type": 2,
            "orderNo": "O1",
            "showStyle": 0,
            "sentName": "系统",
            "createTime": "2024-05-01 10:00:00",
            "message_text": "你的饰品已归还",
            "data_from": "yyyp"
        });
        assert_eq!(repo.insert_message(&msg).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(repo.insert_message(&msg).await.unwrap(), InsertOutcome::Duplicate);

        let row = repo
            .facade()
            .select_one("SELECT \"readStatus\" FROM \"yyyp_messagebox\"", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.i64("readStatus"), Some(0));
    }
}
