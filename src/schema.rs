table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        first_name -> Text,
        last_name -> Text,
        password_hash -> Text,
        date_joined -> Timestamp,
    }
}

table! {
    sessions (token) {
        token -> Text,
        user_id -> Integer,
        expires_at -> Timestamp,
        created_at -> Timestamp,
    }
}

table! {
    categories (id) {
        id -> Integer,
        title -> Text,
        description -> Text,
        slug -> Text,
        is_published -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    locations (id) {
        id -> Integer,
        name -> Text,
        is_published -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    posts (id) {
        id -> Integer,
        title -> Text,
        text -> Text,
        pub_date -> Timestamp,
        author_id -> Integer,
        location_id -> Nullable<Integer>,
        category_id -> Nullable<Integer>,
        is_published -> Bool,
        created_at -> Timestamp,
        image -> Nullable<Text>,
    }
}

table! {
    comments (id) {
        id -> Integer,
        text -> Text,
        post_id -> Integer,
        author_id -> Integer,
        created_at -> Timestamp,
    }
}

joinable!(sessions -> users (user_id));
joinable!(posts -> users (author_id));
joinable!(posts -> categories (category_id));
joinable!(posts -> locations (location_id));
joinable!(comments -> posts (post_id));
joinable!(comments -> users (author_id));

allow_tables_to_appear_in_same_query!(
    users,
    sessions,
    categories,
    locations,
    posts,
    comments,
);
