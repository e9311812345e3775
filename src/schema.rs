diesel::table! {
    bookmarks (id) {
        id -> Text,
        title -> Text,
        url -> Text,
        user_id -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    bookmark_changes (id) {
        id -> BigInt,
        bookmark_id -> Text,
        user_id -> Text,
        kind -> Text,
        changed_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Text,
        provider -> Text,
        email -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    sessions (id) {
        id -> Text,
        user_id -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    markers (key) {
        key -> Text,
        value -> Text,
    }
}

diesel::joinable!(sessions -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(bookmarks, bookmark_changes, users, sessions, markers,);
