// Built-in e-commerce database used by the default scope.

use duckdb::{params, Connection};
use serde::Serialize;
use tracing::info;

/// Tables of the default scope, ordered by name.
pub const SAMPLE_TABLES: [&str; 3] = ["customers", "orders", "products"];

const CREATE_SAMPLE_TABLES_SQL: &str = "
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY,
        name VARCHAR NOT NULL,
        category VARCHAR NOT NULL,
        price DOUBLE NOT NULL,
        stock INTEGER NOT NULL,
        description VARCHAR
    );
    CREATE TABLE IF NOT EXISTS customers (
        id INTEGER PRIMARY KEY,
        name VARCHAR NOT NULL,
        email VARCHAR UNIQUE NOT NULL,
        phone VARCHAR,
        city VARCHAR,
        created_at VARCHAR NOT NULL
    );
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        total_price DOUBLE NOT NULL,
        order_date VARCHAR NOT NULL,
        status VARCHAR NOT NULL,
        FOREIGN KEY (customer_id) REFERENCES customers(id),
        FOREIGN KEY (product_id) REFERENCES products(id)
    );
";

const PRODUCTS: [(&str, &str, f64, i32, &str); 10] = [
    ("Laptop Pro 15", "Electronics", 1299.99, 25, "High-performance laptop with 16GB RAM"),
    ("Wireless Mouse", "Electronics", 29.99, 150, "Ergonomic wireless mouse"),
    ("USB-C Hub", "Electronics", 49.99, 80, "7-in-1 USB-C adapter"),
    ("Office Chair", "Furniture", 299.99, 40, "Ergonomic office chair with lumbar support"),
    ("Standing Desk", "Furniture", 599.99, 15, "Adjustable height standing desk"),
    ("Coffee Maker", "Appliances", 89.99, 60, "Programmable coffee maker"),
    ("Water Bottle", "Accessories", 19.99, 200, "Insulated stainless steel water bottle"),
    ("Backpack", "Accessories", 59.99, 100, "Laptop backpack with multiple compartments"),
    ("Desk Lamp", "Electronics", 39.99, 75, "LED desk lamp with adjustable brightness"),
    ("Notebook Set", "Stationery", 14.99, 300, "Set of 3 premium notebooks"),
];

const CUSTOMERS: [(&str, &str, &str, &str, &str); 8] = [
    ("John Smith", "john.smith@email.com", "555-0101", "New York", "2024-01-15T10:30:00"),
    ("Emma Johnson", "emma.j@email.com", "555-0102", "Los Angeles", "2024-02-20T14:15:00"),
    ("Michael Brown", "mbrown@email.com", "555-0103", "Chicago", "2024-03-10T09:45:00"),
    ("Sarah Davis", "sarah.d@email.com", "555-0104", "Houston", "2024-04-05T16:20:00"),
    ("James Wilson", "jwilson@email.com", "555-0105", "Phoenix", "2024-05-12T11:00:00"),
    ("Lisa Anderson", "lisa.a@email.com", "555-0106", "Philadelphia", "2024-06-18T13:30:00"),
    ("David Martinez", "dmartinez@email.com", "555-0107", "San Antonio", "2024-07-22T15:45:00"),
    ("Jennifer Taylor", "jtaylor@email.com", "555-0108", "San Diego", "2024-08-30T10:15:00"),
];

// (customer_id, product_id, quantity, total_price, order_date, status)
const ORDERS: [(i32, i32, i32, f64, &str, &str); 10] = [
    (1, 1, 1, 1299.99, "2024-09-01T10:30:00", "delivered"),
    (1, 2, 2, 59.98, "2024-09-02T14:20:00", "delivered"),
    (2, 5, 1, 599.99, "2024-09-05T11:15:00", "shipped"),
    (3, 3, 3, 149.97, "2024-09-08T16:45:00", "delivered"),
    (4, 6, 1, 89.99, "2024-09-10T09:30:00", "processing"),
    (5, 1, 1, 1299.99, "2024-09-12T13:00:00", "delivered"),
    (6, 4, 2, 599.98, "2024-09-15T10:45:00", "shipped"),
    (7, 8, 5, 299.95, "2024-09-18T15:20:00", "delivered"),
    (8, 7, 10, 149.90, "2024-09-20T11:30:00", "processing"),
    (2, 9, 1, 39.99, "2024-09-22T14:15:00", "delivered"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleCounts {
    pub products_count: i64,
    pub customers_count: i64,
    pub orders_count: i64,
}

/// Creates the sample tables and seeds them on first use.
pub fn ensure_sample_data(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(CREATE_SAMPLE_TABLES_SQL)?;

    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(());
    }

    let mut stmt = conn.prepare(
        "INSERT INTO products (id, name, category, price, stock, description) VALUES (?, ?, ?, ?, ?, ?)",
    )?;
    for (i, (name, category, price, stock, description)) in PRODUCTS.iter().enumerate() {
        stmt.execute(params![i as i32 + 1, name, category, price, stock, description])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO customers (id, name, email, phone, city, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )?;
    for (i, (name, email, phone, city, created_at)) in CUSTOMERS.iter().enumerate() {
        stmt.execute(params![i as i32 + 1, name, email, phone, city, created_at])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO orders (id, customer_id, product_id, quantity, total_price, order_date, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )?;
    for (i, (customer_id, product_id, quantity, total_price, order_date, status)) in ORDERS.iter().enumerate() {
        stmt.execute(params![i as i32 + 1, customer_id, product_id, quantity, total_price, order_date, status])?;
    }

    info!(
        "Seeded sample data: {} products, {} customers, {} orders",
        PRODUCTS.len(),
        CUSTOMERS.len(),
        ORDERS.len()
    );
    Ok(())
}

pub fn sample_counts(conn: &Connection) -> Result<SampleCounts, duckdb::Error> {
    let count = |table: &str| -> Result<i64, duckdb::Error> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
    };

    Ok(SampleCounts {
        products_count: count("products")?,
        customers_count: count("customers")?,
        orders_count: count("orders")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_once() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_sample_data(&conn).unwrap();
        ensure_sample_data(&conn).unwrap();

        let counts = sample_counts(&conn).unwrap();
        assert_eq!(
            counts,
            SampleCounts {
                products_count: 10,
                customers_count: 8,
                orders_count: 10
            }
        );
    }

    #[test]
    fn orders_join_on_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_sample_data(&conn).unwrap();

        let name: String = conn
            .query_row(
                "SELECT c.name FROM orders o JOIN customers c ON o.customer_id = c.id WHERE o.id = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "Emma Johnson");
    }
}
