// Example schemas used when a submission does not carry its own.

/// Course platform DDL for the relational store
pub const DEFAULT_RELATIONAL_SCHEMA: &str = r#"CREATE TABLE users (
    user_id SERIAL PRIMARY KEY,
    username VARCHAR(50) UNIQUE NOT NULL,
    email VARCHAR(100) UNIQUE NOT NULL,
    password_hash VARCHAR(100) NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE courses (
    course_id SERIAL PRIMARY KEY,
    title VARCHAR(100) NOT NULL,
    description TEXT,
    price DECIMAL(10, 2),
    level VARCHAR(20) CHECK (level IN ('Beginner', 'Intermediate', 'Advanced')),
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE instructors (
    instructor_id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    bio TEXT,
    email VARCHAR(100) UNIQUE NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE enrollments (
    enrollment_id SERIAL PRIMARY KEY,
    user_id INTEGER REFERENCES users(user_id),
    course_id INTEGER REFERENCES courses(course_id),
    enrolled_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    completed BOOLEAN DEFAULT FALSE,
    UNIQUE(user_id, course_id)
);

CREATE TABLE reviews (
    review_id SERIAL PRIMARY KEY,
    user_id INTEGER REFERENCES users(user_id),
    course_id INTEGER REFERENCES courses(course_id),
    rating INTEGER CHECK (rating BETWEEN 1 AND 5),
    comment TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(user_id, course_id)
);

CREATE TABLE course_instructors (
    course_id INTEGER REFERENCES courses(course_id),
    instructor_id INTEGER REFERENCES instructors(instructor_id),
    PRIMARY KEY (course_id, instructor_id)
);"#;

/// The same platform modelled as a property graph
pub const DEFAULT_GRAPH_SCHEMA: &str = r#"Node properties:
- User: {user_id: INTEGER, username: STRING, email: STRING}
- Course: {course_id: INTEGER, title: STRING, description: STRING, price: FLOAT, level: STRING}
- Instructor: {instructor_id: INTEGER, name: STRING, bio: STRING, email: STRING}

Relationships:
- (User)-[:ENROLLED_IN]->(Course)
- (User)-[:REVIEWED]->(Course) {rating: INTEGER, comment: STRING}
- (Instructor)-[:TEACHES]->(Course)
"#;
