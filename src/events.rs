//! 변경 이벤트 정규화
//!
//! 엔트리 하나를 행 단위 INSERT/UPDATE/DELETE 레코드로 변환합니다.
//! 트랜잭션 시작/종료 마커는 데이터 변경이 아니므로 건너뜁니다.

use crate::entry::{Column, Entry, EventType, Header};
use crate::error::Result;
use crate::session::Batch;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// 컬럼명 → 값
pub type ColumnMap = HashMap<String, String>;

/// 변경 연산 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Insert,
    Update,
    Delete,
}

impl OperationType {
    /// 헤더 이벤트 타입 기준. INSERT/DELETE 외에는 모두 UPDATE로 취급
    pub fn from_event_type(event_type: EventType) -> Self {
        match event_type {
            EventType::Insert => OperationType::Insert,
            EventType::Delete => OperationType::Delete,
            _ => OperationType::Update,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        }
    }
}

/// 행 데이터
///
/// INSERT는 after 컬럼, DELETE는 before 컬럼만, UPDATE는 둘 다 가집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeData {
    Update { before: ColumnMap, after: ColumnMap },
    Row(ColumnMap),
}

/// 정규화된 행 변경
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedChange {
    pub schema: String,
    pub table: String,
    pub event_type: OperationType,
    pub data: ChangeData,
    /// 원본 실행 시각
    pub executed_at: Option<DateTime<Utc>>,
    /// `logfile_name:logfile_offset`
    pub position: String,
}

fn column_map(columns: &[Column]) -> ColumnMap {
    columns
        .iter()
        .map(|c| (c.name.clone(), c.value.clone()))
        .collect()
}

fn executed_at(header: &Header) -> Option<DateTime<Utc>> {
    if header.execute_time <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(header.execute_time).single()
}

/// 엔트리 디코딩
///
/// 트랜잭션 마커면 `None`, 행 변경이면 행마다 하나의 `NormalizedChange`.
pub fn decode(entry: &Entry) -> Result<Option<Vec<NormalizedChange>>> {
    if entry.is_transaction_marker() {
        return Ok(None);
    }

    let row_change = entry.row_change()?;
    let header = entry.header.clone().unwrap_or_default();
    let op = OperationType::from_event_type(header.event_type());
    let executed_at = executed_at(&header);
    let position = format!("{}:{}", header.logfile_name, header.logfile_offset);

    debug!(
        "Decoding {} rows of {}.{} ({})",
        row_change.row_datas.len(),
        header.schema_name,
        header.table_name,
        op.as_str()
    );

    let changes = row_change
        .row_datas
        .iter()
        .map(|row| {
            let data = match op {
                OperationType::Delete => ChangeData::Row(column_map(&row.before_columns)),
                OperationType::Insert => ChangeData::Row(column_map(&row.after_columns)),
                OperationType::Update => ChangeData::Update {
                    before: column_map(&row.before_columns),
                    after: column_map(&row.after_columns),
                },
            };

            NormalizedChange {
                schema: header.schema_name.clone(),
                table: header.table_name.clone(),
                event_type: op,
                data,
                executed_at,
                position: position.clone(),
            }
        })
        .collect();

    Ok(Some(changes))
}

/// 배치 전체 디코딩 (마커는 제외)
pub fn decode_batch(batch: &Batch) -> Result<Vec<NormalizedChange>> {
    let mut changes = Vec::new();
    for entry in &batch.entries {
        if let Some(rows) = decode(entry)? {
            changes.extend(rows);
        }
    }
    Ok(changes)
}
