/// Iterator over consecutive chunks of a slice, delimited by a pointer array.
pub struct ChunksByIter<'a,'b,T> {
    data : &'a [T],
    ptr  : std::iter::Zip<std::slice::Iter<'b,usize>,std::slice::Iter<'b,usize>>,
}

impl<'a,'b,T> Iterator for ChunksByIter<'a,'b,T> {
    type Item = &'a[T];
    fn next(& mut self) -> Option<Self::Item> {
        self.ptr.next().map(|(&p0,&p1)| &self.data[p0..p1])
    }
}

pub trait ChunksByIterExt<T> {
    /// Iterate over `self[ptr[i]..ptr[i+1]]`. `ptr` must be ascending and end within `self`.
    fn chunks_ptr<'a,'b>(&'a self, ptr : &'b[usize]) -> ChunksByIter<'a,'b,T>;
}

impl<T> ChunksByIterExt<T> for [T] {
    fn chunks_ptr<'a,'b>(&'a self, ptr : &'b[usize]) -> ChunksByIter<'a,'b,T> {
        if let Some(&p) = ptr.last() { if p > self.len() { panic!("Invalid ptr for chunks_ptr iterator") } }
        if ptr.iter().zip(ptr.iter().skip(1)).any(|(p0,p1)| p1 < p0) { panic!("Invalid ptr for chunks_ptr iterator") }
        ChunksByIter{ data : self, ptr : ptr.iter().zip(ptr.get(1..).unwrap_or(&[]).iter()) }
    }
}
