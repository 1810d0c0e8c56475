//! 변경 로그 엔트리 정의 (EntryProtocol.proto)

use crate::error::Result;
use prost::Message;

/// 엔트리 종류
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum EntryType {
    Compatible = 0,
    /// 트랜잭션 시작
    TransactionBegin = 1,
    /// 행 데이터 변경
    RowData = 2,
    /// 트랜잭션 종료
    TransactionEnd = 3,
    Heartbeat = 4,
    GtidLog = 5,
}

/// 원본 이벤트 타입
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    Compatible = 0,
    Insert = 1,
    Update = 2,
    Delete = 3,
    Create = 4,
    Alter = 5,
    Erase = 6,
    Query = 7,
    Truncate = 8,
    Rename = 9,
    /// CREATE INDEX
    Cindex = 10,
    /// DROP INDEX
    Dindex = 11,
    Gtid = 12,
    XaCommit = 13,
    XaRollback = 14,
    MHeartbeat = 15,
}

/// 원본 데이터베이스 종류
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SourceType {
    Compatible = 0,
    Oracle = 1,
    Mysql = 2,
    Pgsql = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pair {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// 엔트리 헤더 (스키마/테이블/이벤트 타입은 여기가 기준)
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(int32, optional, tag = "1")]
    pub version: Option<i32>,
    #[prost(string, tag = "2")]
    pub logfile_name: String,
    #[prost(int64, tag = "3")]
    pub logfile_offset: i64,
    #[prost(int64, tag = "4")]
    pub server_id: i64,
    #[prost(string, tag = "5")]
    pub serveren_code: String,
    /// 실행 시각 (epoch milliseconds)
    #[prost(int64, tag = "6")]
    pub execute_time: i64,
    #[prost(enumeration = "SourceType", optional, tag = "7")]
    pub source_type: Option<i32>,
    #[prost(string, tag = "8")]
    pub schema_name: String,
    #[prost(string, tag = "9")]
    pub table_name: String,
    #[prost(int64, tag = "10")]
    pub event_length: i64,
    #[prost(enumeration = "EventType", optional, tag = "11")]
    pub event_type: Option<i32>,
    #[prost(message, repeated, tag = "12")]
    pub props: Vec<Pair>,
    #[prost(string, tag = "13")]
    pub gtid: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Column {
    #[prost(int32, tag = "1")]
    pub index: i32,
    #[prost(int32, tag = "2")]
    pub sql_type: i32,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(bool, tag = "4")]
    pub is_key: bool,
    #[prost(bool, tag = "5")]
    pub updated: bool,
    #[prost(bool, optional, tag = "6")]
    pub is_null: Option<bool>,
    #[prost(message, repeated, tag = "7")]
    pub props: Vec<Pair>,
    #[prost(string, tag = "8")]
    pub value: String,
    #[prost(int32, tag = "9")]
    pub length: i32,
    #[prost(string, tag = "10")]
    pub mysql_type: String,
}

/// 한 행의 변경 전/후 컬럼
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RowData {
    #[prost(message, repeated, tag = "1")]
    pub before_columns: Vec<Column>,
    #[prost(message, repeated, tag = "2")]
    pub after_columns: Vec<Column>,
    #[prost(message, repeated, tag = "3")]
    pub props: Vec<Pair>,
}

/// `store_value`에 담긴 행 변경 묶음
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RowChange {
    #[prost(int64, tag = "1")]
    pub table_id: i64,
    #[prost(enumeration = "EventType", optional, tag = "2")]
    pub event_type: Option<i32>,
    #[prost(bool, optional, tag = "10")]
    pub is_ddl: Option<bool>,
    #[prost(string, tag = "11")]
    pub sql: String,
    #[prost(message, repeated, tag = "12")]
    pub row_datas: Vec<RowData>,
    #[prost(message, repeated, tag = "13")]
    pub props: Vec<Pair>,
    #[prost(string, tag = "14")]
    pub ddl_schema_name: String,
}

/// 변경 로그 엔트리
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Entry {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(enumeration = "EntryType", optional, tag = "2")]
    pub entry_type: Option<i32>,
    #[prost(bytes = "vec", tag = "3")]
    pub store_value: Vec<u8>,
}

// `entry_type()`, `event_type()` 같은 enum getter는 prost derive가 생성합니다.
impl Entry {
    pub fn is_transaction_marker(&self) -> bool {
        matches!(
            self.entry_type(),
            EntryType::TransactionBegin | EntryType::TransactionEnd
        )
    }

    pub fn row_change(&self) -> Result<RowChange> {
        Ok(RowChange::decode(self.store_value.as_slice())?)
    }

    pub fn decode_from(data: &[u8]) -> Result<Self> {
        Ok(Entry::decode(data)?)
    }
}
