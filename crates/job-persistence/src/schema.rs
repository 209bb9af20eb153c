//! Esquema Diesel (mantenido a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    job_status_summary (node_id, status_key) {
        node_id -> Text,
        status_key -> Varchar,
        full_job_id -> Text,
        job_type -> Nullable<Text>,
        state -> Nullable<Text>,
        start_date -> Nullable<Timestamptz>,
        end_date -> Nullable<Timestamptz>,
        serialized -> Bool,
        isolated -> Bool,
        cancelable -> Bool,
        canceled -> Bool,
        blob_locator -> Nullable<Text>,
    }
}

diesel::table! {
    job_status_log_entry (node_id, status_key, line_index) {
        node_id -> Text,
        status_key -> Varchar,
        line_index -> BigInt,
        level -> Integer,
        ts -> Timestamptz,
        message -> Varchar,
        formatted_message -> Varchar,
        throwable_type -> Nullable<Varchar>,
        throwable_message -> Nullable<Varchar>,
        payload -> Jsonb,
    }
}

diesel::allow_tables_to_appear_in_same_query!(job_status_summary, job_status_log_entry,);
